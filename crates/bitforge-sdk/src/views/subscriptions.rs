//! Subscription tiers and upgrades
//!
//! Payment happens on an external checkout page. Once it completes the tier
//! change is applied through the profile update endpoint.

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use async_trait::async_trait;
use bitforge_client::types::{CheckoutSession, ProfileUpdate, SubscriptionTier, Tier, User};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct TierListing {
    pub tier: SubscriptionTier,
    pub current: bool,
    pub upgrade: bool,
}

pub struct SubscriptionsView {
    ctx: AppContext,
    scope: ViewScope,
    state: Publisher<Vec<TierListing>>,
}

impl SubscriptionsView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("subscriptions");
        let state = scope.publisher();
        Self { ctx, scope, state }
    }

    /// Start a checkout for a higher tier; returns the external payment URL
    pub async fn upgrade(&self, tier: Tier) -> Result<CheckoutSession> {
        let session = self.ctx.require(Capability::Subscribe)?;
        if tier <= session.tier() {
            return Err(SdkError::validation(
                "tier",
                format!("Already on {} or higher", session.tier()),
            ));
        }
        let checkout = self.ctx.client.create_checkout(tier).await?;
        info!(%tier, "Checkout session created");
        Ok(checkout)
    }

    /// Record a completed checkout on the profile
    pub async fn confirm_upgrade(&self, tier: Tier) -> Result<MutationOutcome<User>> {
        let session = self.ctx.require(Capability::Subscribe)?;
        let me = session.user_id().to_string();

        let mutation = Mutation::<User>::new(&me, "update_profile")
            .with_patch(move |user: &mut User| user.tier = tier);

        let client = self.ctx.client.clone();
        let update = ProfileUpdate {
            tier: Some(tier),
            ..Default::default()
        };
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.update_profile(&me, &update).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
            self.load().await;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for SubscriptionsView {
    type Model = Vec<TierListing>;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<Vec<TierListing>>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<Vec<TierListing>> {
        let client = self.ctx.client.clone();
        let current = self.ctx.session.current().map(|s| s.tier());
        let result = self
            .ctx
            .cache
            .fetch_list(&QueryKey::new("subscription_tiers"), || async move {
                client.subscription_tiers().await.map_err(SdkError::from)
            })
            .await
            .map(|tiers| {
                tiers
                    .into_iter()
                    .map(|tier| TierListing {
                        current: current == Some(tier.tier),
                        upgrade: current.map_or(false, |c| tier.tier > c),
                        tier,
                    })
                    .collect()
            });
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
