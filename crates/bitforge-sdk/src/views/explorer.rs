//! User search and live presence

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::context::AppContext;
use crate::error::SdkError;
use crate::validation::normalize_search;
use async_trait::async_trait;
use bitforge_client::types::{OnlineUser, User};
use tokio::sync::watch;
use tracing::debug;

const SEARCH_TASK: &str = "search";
const PRESENCE_TASK: &str = "presence";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub users: Vec<User>,
}

pub struct ExplorerView {
    ctx: AppContext,
    scope: ViewScope,
    results: Publisher<SearchResults>,
    presence: Publisher<Vec<OnlineUser>>,
}

impl ExplorerView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("explorer");
        let results = scope.publisher();
        let presence = scope.publisher();
        Self {
            ctx,
            scope,
            results,
            presence,
        }
    }

    /// Live users, refreshed on the presence interval once loaded
    pub fn presence(&self) -> watch::Receiver<ViewState<Vec<OnlineUser>>> {
        self.presence.subscribe()
    }

    /// Queue a search. Keystrokes inside the debounce window collapse into
    /// one request carrying the latest query.
    pub fn search(&self, query: &str) {
        let query = match normalize_search(query) {
            Some(q) => q,
            None => {
                self.scope.scheduler().cancel(SEARCH_TASK);
                self.results.publish(ViewState::Empty);
                return;
            }
        };

        let client = self.ctx.client.clone();
        let cache = self.ctx.cache.clone();
        let publisher = self.results.clone();
        self.scope.scheduler().schedule_debounced(
            SEARCH_TASK,
            self.ctx.sync.search_debounce(),
            async move {
                debug!(%query, "Searching users");
                let result = match client.search_users(&query).await {
                    Ok(users) => cache
                        .store_list(&QueryKey::new("user_search").param("q", &query), &users)
                        .map(|()| users),
                    Err(e) => Err(SdkError::from(e)),
                };
                let state = match result {
                    Ok(users) if users.is_empty() => ViewState::Empty,
                    Ok(users) => ViewState::Ready(SearchResults { query, users }),
                    Err(e) => ViewState::failed(&e),
                };
                publisher.publish(state);
            },
        );
    }

    fn start_presence(&self) {
        let client = self.ctx.client.clone();
        let publisher = self.presence.clone();
        self.scope
            .scheduler()
            .schedule_poll(PRESENCE_TASK, self.ctx.sync.presence_poll(), move || {
                let client = client.clone();
                let publisher = publisher.clone();
                async move {
                    let result = client.online_users().await.map_err(SdkError::from);
                    publisher.publish(ViewState::from_list(result));
                }
            })
            .detach();
    }
}

#[async_trait]
impl View for ExplorerView {
    type Model = SearchResults;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<SearchResults>> {
        self.results.subscribe()
    }

    /// Nothing searched yet; starts presence polling
    async fn load(&self) -> ViewState<SearchResults> {
        self.results.publish(ViewState::Empty);
        self.start_presence();
        ViewState::Empty
    }

    fn unmount(&self) {
        self.scope.unmount();
    }

    fn is_mounted(&self) -> bool {
        self.scope.is_mounted()
    }
}
