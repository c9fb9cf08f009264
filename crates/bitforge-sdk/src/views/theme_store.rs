//! Theme store
//!
//! Purchases are checked against the local session first: a theme that is
//! already owned, tier-locked or unaffordable never reaches the network.
//! The balance shown after a purchase is always the one the server returned.

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::{EntityCache, QueryKey};
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::session::{Session, SessionHandle};
use async_trait::async_trait;
use bitforge_client::types::{Theme, User};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeListing {
    pub theme: Theme,
    pub owned: bool,
    pub equipped: bool,
    pub affordable: bool,
    /// Requires a higher subscription tier
    pub locked: bool,
}

fn themes_key() -> QueryKey {
    QueryKey::new("store_themes")
}

fn listings(themes: Vec<Theme>, session: Option<&Session>) -> Vec<ThemeListing> {
    themes
        .into_iter()
        .map(|theme| ThemeListing {
            owned: session.is_some_and(|s| s.owns_theme(&theme.id)),
            equipped: session.and_then(|s| s.active_theme()) == Some(theme.id.as_str()),
            affordable: session.is_some_and(|s| s.can_afford(theme.price)),
            locked: session.map_or(true, |s| s.tier() < theme.required_tier),
            theme,
        })
        .collect()
}

fn derive(cache: &EntityCache, session: &SessionHandle) -> Option<ViewState<Vec<ThemeListing>>> {
    let themes = cache.list_entities::<Theme>(&themes_key())?;
    let listed = listings(themes, session.current().as_ref());
    Some(ViewState::from_list(Ok(listed)))
}

pub struct ThemeStoreView {
    ctx: AppContext,
    scope: ViewScope,
    state: Publisher<Vec<ThemeListing>>,
}

impl ThemeStoreView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("theme_store");
        let state = scope.publisher();
        let view = Self { ctx, scope, state };
        view.follow_cache();
        view
    }

    /// Ownership and balance badges follow the signed-in user's record
    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let session = self.ctx.session_handle();
        let filter_session = session.clone();
        let publisher = self.state.clone();
        self.scope.watch_cache(
            &self.ctx.cache,
            move |event| {
                event.touches_kind(EntityKind::Theme)
                    || filter_session
                        .user_id()
                        .is_some_and(|me| event.touches(EntityKind::User, &me))
            },
            move || {
                if let Some(state) = derive(&cache, &session) {
                    publisher.publish(state);
                }
            },
        );
    }

    async fn theme(&self, theme_id: &str) -> Result<Theme> {
        if let Some(theme) = self.ctx.cache.get::<Theme>(theme_id) {
            return Ok(theme);
        }
        let client = self.ctx.client.clone();
        let themes = self
            .ctx
            .cache
            .fetch_list(&themes_key(), || async move {
                client.store_themes().await.map_err(SdkError::from)
            })
            .await?;
        themes
            .into_iter()
            .find(|t| t.id == theme_id)
            .ok_or_else(|| SdkError::validation("theme", format!("Unknown theme {}", theme_id)))
    }

    pub async fn purchase(&self, theme_id: &str) -> Result<MutationOutcome<User>> {
        let session = self.ctx.require(Capability::Purchase)?;
        let theme = self.theme(theme_id).await?;

        if session.owns_theme(&theme.id) {
            return Err(SdkError::AlreadyOwned(theme.name));
        }
        if session.tier() < theme.required_tier {
            return Err(SdkError::validation(
                "tier",
                format!("{} requires the {} tier", theme.name, theme.required_tier),
            ));
        }
        if !session.can_afford(theme.price) {
            return Err(SdkError::InsufficientBalance {
                required: theme.price,
                available: session.code_bits(),
            });
        }

        let (id, price) = (theme.id.clone(), theme.price);
        let mutation = Mutation::<User>::new(session.user_id(), format!("purchase_theme:{}", id))
            .with_patch(move |user: &mut User| {
                user.code_bits = user.code_bits.saturating_sub(price);
                user.owned_themes.push(id);
            });

        let client = self.ctx.client.clone();
        let cache = self.ctx.cache.clone();
        let id = theme.id.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                let receipt = client.purchase_theme(&id).await?;
                cache.put(&receipt.item)?;
                Ok::<_, SdkError>(receipt.user)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
            info!(theme_id = %theme.id, code_bits = user.code_bits, "Theme purchased");
        }
        Ok(outcome)
    }

    pub async fn equip(&self, theme_id: &str) -> Result<MutationOutcome<User>> {
        let session = self.ctx.require(Capability::Purchase)?;
        if !session.owns_theme(theme_id) {
            return Err(SdkError::validation("theme", "Buy this theme before equipping it"));
        }

        let id = theme_id.to_string();
        let mutation = Mutation::<User>::new(session.user_id(), "equip_theme")
            .with_patch(move |user: &mut User| user.active_theme = Some(id));

        let client = self.ctx.client.clone();
        let id = theme_id.to_string();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.equip_theme(&id).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for ThemeStoreView {
    type Model = Vec<ThemeListing>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<ThemeListing>>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<Vec<ThemeListing>> {
        let client = self.ctx.client.clone();
        let result = self
            .ctx
            .cache
            .fetch_list(&themes_key(), || async move {
                client.store_themes().await.map_err(SdkError::from)
            })
            .await
            .map(|themes| listings(themes, self.ctx.session.current().as_ref()));
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
