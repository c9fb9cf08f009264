//! Forum categories, threads and replies

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::validation::Validate;
use async_trait::async_trait;
use futures::future;
use bitforge_client::types::{
    CreatePostInput, CreateThreadInput, ForumCategory, Thread, UpdateThreadInput, VoteDirection,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ForumsModel {
    pub categories: Vec<ForumCategory>,
    pub category_id: Option<String>,
    /// Threads of the selected category, in server order
    pub threads: Vec<Thread>,
}

fn categories_key() -> QueryKey {
    QueryKey::new("forum_categories")
}

fn threads_key(category_id: &str) -> QueryKey {
    QueryKey::new("threads").param("categoryId", category_id)
}

/// Toggle `voter`'s vote in `direction`, clearing any opposite vote
pub(crate) fn apply_vote(thread: &mut Thread, voter: &str, direction: VoteDirection) {
    let Thread {
        upvoters,
        downvoters,
        score,
        ..
    } = thread;
    let (same, opposite) = match direction {
        VoteDirection::Up => (upvoters, downvoters),
        VoteDirection::Down => (downvoters, upvoters),
    };

    let had_same = same.iter().any(|v| v == voter);
    let had_opposite = opposite.iter().any(|v| v == voter);
    same.retain(|v| v != voter);
    opposite.retain(|v| v != voter);
    if !had_same {
        same.push(voter.to_string());
    }

    let sign = match direction {
        VoteDirection::Up => 1,
        VoteDirection::Down => -1,
    };
    let delta = match (had_same, had_opposite) {
        (true, _) => -sign,
        (false, true) => 2 * sign,
        (false, false) => sign,
    };
    *score += delta;
}

pub struct ForumsView {
    ctx: AppContext,
    category: Arc<Mutex<Option<String>>>,
    scope: ViewScope,
    state: Publisher<ForumsModel>,
}

impl ForumsView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("forums");
        let state = scope.publisher();
        let view = Self {
            ctx,
            category: Arc::new(Mutex::new(None)),
            scope,
            state,
        };
        view.follow_cache();
        view
    }

    /// Optimistic votes and replies show up in the listing immediately
    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let category = self.category.clone();
        let publisher = self.state.clone();
        self.scope.watch_cache(
            &self.ctx.cache,
            |event| matches!(event, crate::cache::CacheEvent::Put { kind: EntityKind::Thread, .. }),
            move || {
                let current = publisher.current();
                let model = match current.ready() {
                    Some(model) => model.clone(),
                    None => return,
                };
                let selected = category.lock().ok().and_then(|c| c.clone());
                let threads = match selected.as_deref() {
                    Some(id) => match cache.list_entities::<Thread>(&threads_key(id)) {
                        Some(threads) => threads,
                        None => return,
                    },
                    None => Vec::new(),
                };
                publisher.publish(ViewState::Ready(ForumsModel {
                    category_id: selected,
                    threads,
                    ..model
                }));
            },
        );
    }

    pub fn selected_category(&self) -> Option<String> {
        self.category.lock().ok().and_then(|c| c.clone())
    }

    /// Show the threads of one category
    pub async fn select_category(&self, category_id: &str) -> ViewState<ForumsModel> {
        if let Ok(mut current) = self.category.lock() {
            *current = Some(category_id.to_string());
        }
        self.load().await
    }

    async fn fetch_threads(&self, category_id: &str) -> Result<Vec<Thread>> {
        let client = self.ctx.client.clone();
        let id = category_id.to_string();
        self.ctx
            .cache
            .fetch_list(&threads_key(category_id), || async move {
                client.list_threads(&id).await.map_err(SdkError::from)
            })
            .await
    }

    /// Full thread with its posts; always fetched fresh
    pub async fn open_thread(&self, thread_id: &str) -> Result<Thread> {
        let thread = self.ctx.client.get_thread(thread_id).await?;
        self.ctx.cache.put(&thread)?;
        Ok(thread)
    }

    pub async fn create_thread(&self, input: CreateThreadInput) -> Result<MutationOutcome<Thread>> {
        input.validate()?;
        let me = self.ctx.require(Capability::PostInForums)?.user_id().to_string();

        let placeholder = Thread {
            id: format!("pending-thread:{}:{}", input.category_id, input.title),
            category_id: input.category_id.clone(),
            title: input.title.clone(),
            body: input.body.clone(),
            author_id: me,
            author_name: None,
            score: 0,
            upvoters: Vec::new(),
            downvoters: Vec::new(),
            reply_count: 0,
            pinned: false,
            locked: false,
            posts: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        let mutation = Mutation::create("create", placeholder)
            .invalidates(EntityKind::Thread)
            .invalidates(EntityKind::ForumCategory)
            .invalidates(EntityKind::FeedItem);

        let client = self.ctx.client.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.create_thread(&input).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref thread) = outcome {
            info!(thread_id = %thread.id, category_id = %thread.category_id, "Thread created");
            self.load().await;
        }
        Ok(outcome)
    }

    pub async fn reply(&self, thread_id: &str, body: &str) -> Result<MutationOutcome<Thread>> {
        let input = CreatePostInput {
            body: body.trim().to_string(),
        };
        input.validate()?;
        self.ctx.require(Capability::PostInForums)?;

        // Keyed by content: a resubmitted reply is a duplicate, a different one is not
        let mutation = Mutation::<Thread>::new(thread_id, format!("reply:{}", input.body))
            .with_patch(|thread: &mut Thread| thread.reply_count += 1)
            .invalidates(EntityKind::FeedItem);

        let client = self.ctx.client.clone();
        let id = thread_id.to_string();
        self.ctx
            .executor
            .mutate(mutation, || async move {
                client.create_post(&id, &input).await.map_err(SdkError::from)
            })
            .await
    }

    pub async fn vote(&self, thread_id: &str, direction: VoteDirection) -> Result<MutationOutcome<Thread>> {
        let me = self.ctx.require(Capability::Vote)?.user_id().to_string();

        let mutation = Mutation::<Thread>::new(thread_id, format!("vote:{}", direction.as_str()))
            .with_patch(move |thread: &mut Thread| apply_vote(thread, &me, direction));

        let client = self.ctx.client.clone();
        let id = thread_id.to_string();
        self.ctx
            .executor
            .mutate(mutation, || async move {
                client.vote_thread(&id, direction).await.map_err(SdkError::from)
            })
            .await
    }

    /// Authors may edit their own threads; moderators any thread
    fn check_owner(&self, thread_id: &str) -> Result<()> {
        let session = self.ctx.require(Capability::PostInForums)?;
        let author = self
            .ctx
            .cache
            .get::<Thread>(thread_id)
            .map(|t| t.author_id);
        if author.as_deref() == Some(session.user_id()) {
            return Ok(());
        }
        self.ctx.capabilities().check(Capability::ModerateContent)
    }

    pub async fn edit_thread(&self, thread_id: &str, input: UpdateThreadInput) -> Result<MutationOutcome<Thread>> {
        input.validate()?;
        self.check_owner(thread_id)?;

        let patch = input.clone();
        let mutation = Mutation::<Thread>::new(thread_id, "edit").with_patch(move |thread: &mut Thread| {
            if let Some(title) = patch.title {
                thread.title = title;
            }
            if let Some(body) = patch.body {
                thread.body = body;
            }
        });

        let client = self.ctx.client.clone();
        let id = thread_id.to_string();
        self.ctx
            .executor
            .mutate(mutation, || async move {
                client.update_thread(&id, &input).await.map_err(SdkError::from)
            })
            .await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<MutationOutcome<()>> {
        self.check_owner(thread_id)?;

        let client = self.ctx.client.clone();
        let id = thread_id.to_string();
        let outcome = self
            .ctx
            .executor
            .remove::<Thread, _, _>(thread_id, "delete", &[EntityKind::ForumCategory], || async move {
                client.delete_thread(&id).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            self.load().await;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for ForumsView {
    type Model = ForumsModel;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<ForumsModel>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<ForumsModel> {
        let client = self.ctx.client.clone();
        let key = categories_key();
        let categories = self
            .ctx
            .cache
            .fetch_list(&key, || async move {
                client.forum_categories().await.map_err(SdkError::from)
            });

        let category_id = self.selected_category();
        let threads = async {
            match category_id.as_deref() {
                Some(id) => self.fetch_threads(id).await,
                None => Ok(Vec::new()),
            }
        };
        let result = future::try_join(categories, threads).await;

        let state = match result {
            Ok((categories, _)) if categories.is_empty() => ViewState::Empty,
            Ok((categories, threads)) => ViewState::Ready(ForumsModel {
                categories,
                category_id,
                threads,
            }),
            Err(e) => ViewState::failed(&e),
        };
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thread() -> Thread {
        serde_json::from_value(json!({
            "id": "t1",
            "categoryId": "general",
            "title": "gg",
            "authorId": "u9",
        }))
        .unwrap()
    }

    #[test]
    fn test_vote_toggles() {
        let mut t = thread();
        apply_vote(&mut t, "u1", VoteDirection::Up);
        assert_eq!((t.score, t.upvoters.len()), (1, 1));

        apply_vote(&mut t, "u1", VoteDirection::Up);
        assert_eq!((t.score, t.upvoters.len()), (0, 0));
    }

    #[test]
    fn test_vote_switches_side() {
        let mut t = thread();
        apply_vote(&mut t, "u1", VoteDirection::Up);
        apply_vote(&mut t, "u1", VoteDirection::Down);
        assert_eq!(t.score, -1);
        assert!(t.upvoters.is_empty());
        assert_eq!(t.downvoters, vec!["u1"]);
    }
}
