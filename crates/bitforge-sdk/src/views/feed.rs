//! Activity feed, refreshed on an interval while mounted

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::{EntityCache, QueryKey};
use crate::context::AppContext;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use bitforge_client::types::{FeedItem, FeedQuery};
use bitforge_client::ApiClient;
use tokio::sync::watch;

const REFRESH_TASK: &str = "feed";

fn feed_key(query: &FeedQuery) -> QueryKey {
    QueryKey::new("feed")
        .param("limit", query.limit)
        .opt_param("userId", query.user_id.as_deref())
}

/// Always goes to the network; the feed is replaced wholesale each refresh
async fn fetch(client: &ApiClient, cache: &EntityCache, query: &FeedQuery) -> Result<Vec<FeedItem>> {
    let items = client.feed(query).await.map_err(SdkError::from)?;
    cache.store_list(&feed_key(query), &items)?;
    Ok(items)
}

pub struct FeedView {
    ctx: AppContext,
    query: FeedQuery,
    scope: ViewScope,
    state: Publisher<Vec<FeedItem>>,
}

impl FeedView {
    /// Global feed, or one user's activity when `user_id` is set
    pub fn new(ctx: AppContext, user_id: Option<String>) -> Self {
        let query = FeedQuery {
            limit: ctx.sync.feed_limit,
            user_id,
        };
        let scope = ViewScope::new("feed");
        let state = scope.publisher();
        Self {
            ctx,
            query,
            scope,
            state,
        }
    }

    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    /// Fetch now, outside the refresh schedule
    pub async fn refresh(&self) -> ViewState<Vec<FeedItem>> {
        let state = ViewState::from_list(fetch(&self.ctx.client, &self.ctx.cache, &self.query).await);
        self.state.publish(state.clone());
        state
    }

    fn start_refresh(&self) {
        let client = self.ctx.client.clone();
        let cache = self.ctx.cache.clone();
        let query = self.query.clone();
        let publisher = self.state.clone();
        self.scope
            .scheduler()
            .schedule_poll(REFRESH_TASK, self.ctx.sync.feed_poll(), move || {
                let client = client.clone();
                let cache = cache.clone();
                let query = query.clone();
                let publisher = publisher.clone();
                async move {
                    let result = fetch(&client, &cache, &query).await;
                    // Keep showing the last good page through a transient failure
                    if result.is_err() && publisher.current().ready().is_some() {
                        return;
                    }
                    publisher.publish(ViewState::from_list(result));
                }
            })
            .detach();
    }
}

#[async_trait]
impl View for FeedView {
    type Model = Vec<FeedItem>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<FeedItem>>> {
        self.state.subscribe()
    }

    /// Starts the refresh schedule; its immediate first run is the initial
    /// fetch, which this waits for.
    async fn load(&self) -> ViewState<Vec<FeedItem>> {
        let mut rx = self.state.subscribe();
        self.state.publish(ViewState::Loading);
        self.start_refresh();

        tokio::select! {
            first = rx.wait_for(|state| !state.is_loading()) => {
                first.map(|state| state.clone()).unwrap_or_else(|_| self.state.current())
            }
            // Unmounted before the first fetch finished
            _ = self.scope.unmounted() => self.state.current(),
        }
    }

    fn unmount(&self) {
        self.scope.unmount();
    }

    fn is_mounted(&self) -> bool {
        self.scope.is_mounted()
    }
}
