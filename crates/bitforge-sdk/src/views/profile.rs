//! User profile screen

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::EntityCache;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use crate::session::SessionHandle;
use crate::validation::Validate;
use async_trait::async_trait;
use bitforge_client::types::{ProfileUpdate, User};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileModel {
    pub user: User,
    pub is_self: bool,
    /// The signed-in user is among this user's followers
    pub is_following: bool,
    pub has_blocked: bool,
}

impl ProfileModel {
    pub fn follow_label(&self) -> &'static str {
        if self.is_following {
            "Linked"
        } else {
            "Link"
        }
    }
}

fn derive(cache: &EntityCache, session: &SessionHandle, user_id: &str) -> Option<ProfileModel> {
    let user = cache.get::<User>(user_id)?;
    let current = session.current();
    let me = current.as_ref().map(|s| s.user_id());
    Some(ProfileModel {
        is_self: me == Some(user_id),
        is_following: me.is_some_and(|me| user.followers.iter().any(|f| f == me)),
        has_blocked: current.as_ref().is_some_and(|s| s.has_blocked(user_id)),
        user,
    })
}

pub struct ProfileView {
    ctx: AppContext,
    user_id: String,
    scope: ViewScope,
    state: Publisher<ProfileModel>,
}

impl ProfileView {
    pub fn new(ctx: AppContext, user_id: impl Into<String>) -> Self {
        let scope = ViewScope::new("profile");
        let state = scope.publisher();
        let view = Self {
            ctx,
            user_id: user_id.into(),
            scope,
            state,
        };
        view.follow_cache();
        view
    }

    /// Re-derive whenever this user or the signed-in user changes in the cache
    fn follow_cache(&self) {
        let cache = self.ctx.cache.clone();
        let session = self.ctx.session_handle();
        let filter_session = session.clone();
        let publisher = self.state.clone();
        let target = self.user_id.clone();
        let filter_target = target.clone();

        self.scope.watch_cache(
            &self.ctx.cache,
            move |event| {
                event.touches(EntityKind::User, &filter_target)
                    || filter_session
                        .user_id()
                        .is_some_and(|me| event.touches(EntityKind::User, &me))
            },
            move || {
                if let Some(model) = derive(&cache, &session, &target) {
                    publisher.publish(ViewState::Ready(model));
                }
            },
        );
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn current(&self) -> ViewState<ProfileModel> {
        self.state.current()
    }

    pub async fn follow(&self) -> Result<MutationOutcome<User>> {
        let me = self.ctx.require(Capability::Follow)?.user_id().to_string();
        if me == self.user_id {
            return Err(SdkError::validation("user", "You can't link with yourself"));
        }

        let mutation = Mutation::<User>::new(&self.user_id, "follow")
            .with_patch(move |user: &mut User| {
                if !user.followers.contains(&me) {
                    user.followers.push(me);
                }
            })
            .invalidates(EntityKind::FeedItem);

        let client = self.ctx.client.clone();
        let target = self.user_id.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.follow_user(&target).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            self.ctx.refresh_session().await;
        }
        Ok(outcome)
    }

    pub async fn unfollow(&self) -> Result<MutationOutcome<User>> {
        let me = self.ctx.require(Capability::Follow)?.user_id().to_string();

        let mutation = Mutation::<User>::new(&self.user_id, "unfollow")
            .with_patch(move |user: &mut User| user.followers.retain(|f| f != &me))
            .invalidates(EntityKind::FeedItem);

        let client = self.ctx.client.clone();
        let target = self.user_id.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.unfollow_user(&target).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            self.ctx.refresh_session().await;
        }
        Ok(outcome)
    }

    /// Follow or unfollow depending on what the screen currently shows.
    /// Ignored while a link change for this user is still in flight.
    pub async fn toggle_follow(&self) -> Result<MutationOutcome<User>> {
        let executor = &self.ctx.executor;
        if ["follow", "unfollow"]
            .iter()
            .any(|op| executor.is_in_flight(EntityKind::User, &self.user_id, op))
        {
            debug!(user_id = %self.user_id, "Link change already in flight");
            return Ok(MutationOutcome::Ignored);
        }

        let following = self
            .state
            .current()
            .ready()
            .is_some_and(|model| model.is_following);
        if following {
            self.unfollow().await
        } else {
            self.follow().await
        }
    }

    pub async fn block(&self) -> Result<MutationOutcome<User>> {
        let me = self.ctx.require(Capability::Follow)?.user_id().to_string();
        if me == self.user_id {
            return Err(SdkError::validation("user", "You can't block yourself"));
        }

        let target = self.user_id.clone();
        let mutation = Mutation::<User>::new(&me, format!("block:{}", target))
            .with_patch(move |user: &mut User| {
                if !user.blocked.contains(&target) {
                    user.blocked.push(target);
                }
            });

        let client = self.ctx.client.clone();
        let target = self.user_id.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.block_user(&target).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
        }
        Ok(outcome)
    }

    /// Edit the signed-in user's own profile, including a tier change
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<MutationOutcome<User>> {
        update.validate()?;
        let me = self.ctx.require(Capability::EditProfile)?.user_id().to_string();
        if me != self.user_id {
            return Err(SdkError::Forbidden(Capability::EditProfile));
        }

        let patch = update.clone();
        let mutation = Mutation::<User>::new(&me, "update_profile").with_patch(move |user: &mut User| {
            if let Some(name) = patch.display_name {
                user.display_name = Some(name);
            }
            if let Some(bio) = patch.bio {
                user.bio = Some(bio);
            }
            if let Some(avatar) = patch.avatar_url {
                user.avatar_url = Some(avatar);
            }
            if let Some(tier) = patch.tier {
                user.tier = tier;
            }
        });

        let client = self.ctx.client.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.update_profile(&me, &update).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref user) = outcome {
            self.ctx.session.on_update(user)?;
            info!(user_id = %user.id, "Profile updated");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl View for ProfileView {
    type Model = ProfileModel;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<ProfileModel>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<ProfileModel> {
        self.state.publish(ViewState::Loading);
        let result = match self.ctx.client.get_user(&self.user_id).await {
            Ok(user) => self.ctx.cache.put(&user),
            Err(e) => Err(e.into()),
        };
        let state = match result {
            Ok(()) => match derive(&self.ctx.cache, &self.ctx.session_handle(), &self.user_id) {
                Some(model) => ViewState::Ready(model),
                None => ViewState::Empty,
            },
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
