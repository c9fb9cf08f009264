//! Clan directory

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::validation::Validate;
use async_trait::async_trait;
use bitforge_client::types::{Clan, ClanSort, CreateClanInput};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

fn list_key(sort: ClanSort) -> QueryKey {
    QueryKey::new("clans").param("sort", sort.as_str())
}

pub struct ClansView {
    ctx: AppContext,
    sort: Arc<Mutex<ClanSort>>,
    scope: ViewScope,
    state: Publisher<Vec<Clan>>,
}

impl ClansView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("clans");
        let state = scope.publisher();
        let view = Self {
            ctx,
            sort: Arc::new(Mutex::new(ClanSort::default())),
            scope,
            state,
        };
        view.follow_cache();
        view
    }

    /// Re-render the listing when an entry changes (optimistic join)
    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let sort = self.sort.clone();
        let publisher = self.state.clone();
        self.scope.watch_cache(
            &self.ctx.cache,
            |event| matches!(event.kind(), Some(EntityKind::Clan)),
            move || {
                let sort = sort.lock().map(|s| *s).unwrap_or_default();
                if let Some(clans) = cache.list_entities::<Clan>(&list_key(sort)) {
                    publisher.publish(ViewState::from_list(Ok(clans)));
                }
            },
        );
    }

    pub fn sort(&self) -> ClanSort {
        self.sort.lock().map(|s| *s).unwrap_or_default()
    }

    /// Change the sort order and reload
    pub async fn set_sort(&self, sort: ClanSort) -> ViewState<Vec<Clan>> {
        if let Ok(mut current) = self.sort.lock() {
            *current = sort;
        }
        self.load().await
    }

    pub async fn open(&self, clan_id: &str) -> Result<Clan> {
        let client = self.ctx.client.clone();
        self.ctx
            .cache
            .fetch_entity(clan_id, || async move {
                client.get_clan(clan_id).await.map_err(SdkError::from)
            })
            .await
    }

    /// Create a clan. Input is checked locally before any request.
    pub async fn create(&self, input: CreateClanInput) -> Result<MutationOutcome<Clan>> {
        input.validate()?;
        let me = self.ctx.require(Capability::CreateClan)?.user_id().to_string();

        let placeholder = Clan {
            id: format!("pending-clan:{}", input.tag.to_lowercase()),
            name: input.name.clone(),
            tag: input.tag.clone(),
            description: input.description.clone(),
            owner_id: Some(me.clone()),
            members: vec![me],
            created_at: None,
        };
        let mutation = Mutation::create("create", placeholder).invalidates(EntityKind::Clan);

        let client = self.ctx.client.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.create_clan(&input).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref clan) = outcome {
            info!(clan_id = %clan.id, tag = %clan.tag, "Clan created");
            self.ctx.refresh_session().await;
            self.load().await;
        }
        Ok(outcome)
    }

    pub async fn join(&self, clan_id: &str) -> Result<MutationOutcome<Clan>> {
        let me = self.ctx.require(Capability::JoinClan)?.user_id().to_string();

        // Member counts drive the default ordering
        let mutation = Mutation::<Clan>::new(clan_id, "join")
            .with_patch(move |clan: &mut Clan| {
                if !clan.members.contains(&me) {
                    clan.members.push(me);
                }
            })
            .invalidates(EntityKind::Clan);

        let client = self.ctx.client.clone();
        let id = clan_id.to_string();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.join_clan(&id).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            self.ctx.refresh_session().await;
            self.load().await;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for ClansView {
    type Model = Vec<Clan>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<Clan>>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<Vec<Clan>> {
        let sort = self.sort();
        let client = self.ctx.client.clone();
        let result = self
            .ctx
            .cache
            .fetch_list(&list_key(sort), || async move {
                client.list_clans(sort).await.map_err(SdkError::from)
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
