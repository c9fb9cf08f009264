//! A user's media gallery

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use async_trait::async_trait;
use bitforge_client::types::MediaItem;
use tokio::sync::watch;

pub struct MediaView {
    ctx: AppContext,
    owner_id: String,
    scope: ViewScope,
    state: Publisher<Vec<MediaItem>>,
}

impl MediaView {
    pub fn new(ctx: AppContext, owner_id: impl Into<String>) -> Self {
        let scope = ViewScope::new("media");
        let state = scope.publisher();
        let view = Self {
            ctx,
            owner_id: owner_id.into(),
            scope,
            state,
        };
        view.follow_cache();
        view
    }

    fn key(&self) -> QueryKey {
        QueryKey::new("media").param("userId", &self.owner_id)
    }

    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let key = self.key();
        let publisher = self.state.clone();
        self.scope.watch_cache(
            &self.ctx.cache,
            |event| event.kind() == Some(EntityKind::Media),
            move || {
                if let Some(items) = cache.list_entities::<MediaItem>(&key) {
                    publisher.publish(ViewState::from_list(Ok(items)));
                }
            },
        );
    }

    /// Like or unlike
    pub async fn like(&self, media_id: &str) -> Result<MutationOutcome<MediaItem>> {
        let me = self.ctx.require(Capability::LikeMedia)?.user_id().to_string();

        let mutation = Mutation::<MediaItem>::new(media_id, "like").with_patch(move |item: &mut MediaItem| {
            if item.likes.contains(&me) {
                item.likes.retain(|l| l != &me);
            } else {
                item.likes.push(me);
            }
        });

        let client = self.ctx.client.clone();
        let id = media_id.to_string();
        self.ctx
            .executor
            .mutate(mutation, || async move {
                client.like_media(&id).await.map_err(SdkError::from)
            })
            .await
    }
}

#[async_trait]
impl View for MediaView {
    type Model = Vec<MediaItem>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<MediaItem>>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<Vec<MediaItem>> {
        let client = self.ctx.client.clone();
        let owner = self.owner_id.clone();
        let result = self
            .ctx
            .cache
            .fetch_list(&self.key(), || async move {
                client.user_media(&owner).await.map_err(SdkError::from)
            })
            .await;
        let state = ViewState::from_list(result);
        self.state.publish(state.clone());
        state
    }

    fn unmount(&self) {
        self.scope.unmount();
    }

    fn is_mounted(&self) -> bool {
        self.scope.is_mounted()
    }
}
