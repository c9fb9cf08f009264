//! Marketplace listing and purchases

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::{EntityCache, QueryKey};
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::session::{Session, SessionHandle};
use async_trait::async_trait;
use bitforge_client::types::{MarketplaceItem, User};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketListing {
    pub item: MarketplaceItem,
    pub owned: bool,
    pub affordable: bool,
}

fn items_key(category: Option<&str>) -> QueryKey {
    QueryKey::new("marketplace").opt_param("category", category)
}

fn listings(items: Vec<MarketplaceItem>, session: Option<&Session>) -> Vec<MarketListing> {
    items
        .into_iter()
        .map(|item| MarketListing {
            owned: session.is_some_and(|s| s.owns_item(&item.id)),
            affordable: session.is_some_and(|s| s.can_afford(item.price)),
            item,
        })
        .collect()
}

fn derive(
    cache: &EntityCache,
    session: &SessionHandle,
    category: Option<&str>,
) -> Option<ViewState<Vec<MarketListing>>> {
    let items = cache.list_entities::<MarketplaceItem>(&items_key(category))?;
    Some(ViewState::from_list(Ok(listings(items, session.current().as_ref()))))
}

pub struct MarketplaceView {
    ctx: AppContext,
    category: Arc<Mutex<Option<String>>>,
    scope: ViewScope,
    state: Publisher<Vec<MarketListing>>,
}

impl MarketplaceView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("marketplace");
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

    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let session = self.ctx.session_handle();
        let filter_session = session.clone();
        let category = self.category.clone();
        let publisher = self.state.clone();
        self.scope.watch_cache(
            &self.ctx.cache,
            move |event| {
                event.touches_kind(EntityKind::MarketplaceItem)
                    || filter_session
                        .user_id()
                        .is_some_and(|me| event.touches(EntityKind::User, &me))
            },
            move || {
                let category = category.lock().ok().and_then(|c| c.clone());
                if let Some(state) = derive(&cache, &session, category.as_deref()) {
                    publisher.publish(state);
                }
            },
        );
    }

    pub fn category(&self) -> Option<String> {
        self.category.lock().ok().and_then(|c| c.clone())
    }

    /// Filter by category (`None` = everything) and reload
    pub async fn set_category(&self, category: Option<String>) -> ViewState<Vec<MarketListing>> {
        if let Ok(mut current) = self.category.lock() {
            *current = category;
        }
        self.load().await
    }

    fn cached_item(&self, item_id: &str) -> Result<MarketplaceItem> {
        self.ctx
            .cache
            .get::<MarketplaceItem>(item_id)
            .ok_or_else(|| SdkError::validation("item", format!("Unknown item {}", item_id)))
    }

    /// Buy an item. Non-stackable items can only be owned once.
    pub async fn purchase(&self, item_id: &str) -> Result<MutationOutcome<User>> {
        let session = self.ctx.require(Capability::Purchase)?;
        let item = match self.cached_item(item_id) {
            Ok(item) => item,
            Err(_) => {
                self.load().await;
                self.cached_item(item_id)?
            }
        };

        if !item.stackable && session.owns_item(&item.id) {
            return Err(SdkError::AlreadyOwned(item.name));
        }
        if !session.can_afford(item.price) {
            return Err(SdkError::InsufficientBalance {
                required: item.price,
                available: session.code_bits(),
            });
        }

        let (id, price) = (item.id.clone(), item.price);
        let mutation = Mutation::<User>::new(session.user_id(), format!("purchase_item:{}", id))
            .with_patch(move |user: &mut User| {
                user.code_bits = user.code_bits.saturating_sub(price);
                user.inventory.push(id);
            });

        let client = self.ctx.client.clone();
        let cache = self.ctx.cache.clone();
        let id = item.id.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                let receipt = client.purchase_item(&id).await?;
                cache.put(&receipt.item)?;
                Ok::<_, SdkError>(receipt.user)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
            info!(item_id = %item.id, code_bits = user.code_bits, "Item purchased");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for MarketplaceView {
    type Model = Vec<MarketListing>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<MarketListing>>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<Vec<MarketListing>> {
        let category = self.category();
        let client = self.ctx.client.clone();
        let filter = category.clone();
        let result = self
            .ctx
            .cache
            .fetch_list(&items_key(category.as_deref()), || async move {
                client
                    .marketplace_items(filter.as_deref())
                    .await
                    .map_err(SdkError::from)
            })
            .await
            .map(|items| listings(items, self.ctx.session.current().as_ref()));
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
