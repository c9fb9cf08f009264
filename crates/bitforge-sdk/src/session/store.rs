//! Single-writer session store

use super::state::Session;
use crate::cache::EntityCache;
use crate::error::{Result, SdkError};
use crate::validation::Validate;
use bitforge_client::types::{AuthResponse, LoginRequest, SignupRequest, User};
use bitforge_client::{ApiClient, ClientError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Read-only view of the current session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionHandle {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|s| s.user_id().to_string())
    }

    /// Current session, or `NotAuthenticated`
    pub fn require(&self) -> Result<Session> {
        self.current().ok_or(SdkError::NotAuthenticated)
    }

    /// Wait for the next change. Returns false once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Owner of the current session
pub struct SessionStore {
    client: ApiClient,
    cache: Arc<EntityCache>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    pub fn new(client: ApiClient, cache: Arc<EntityCache>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { client, cache, tx }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Session> {
        request.validate()?;
        let auth = self.client.login(request).await?;
        self.establish(auth)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Session> {
        request.validate()?;
        let auth = self.client.signup(request).await?;
        self.establish(auth)
    }

    /// Restore the session from a persisted token.
    ///
    /// No token means no session. A token the server rejects is cleared.
    /// Network failures are returned and the token kept for a later retry.
    pub async fn restore(&self) -> Result<Option<Session>> {
        if self.client.tokens().load().is_none() {
            debug!("No persisted token, starting signed out");
            return Ok(None);
        }

        match self.client.me().await {
            Ok(user) => {
                info!(user_id = %user.id, "Session restored");
                Ok(Some(self.install(user)?))
            }
            Err(ClientError::Unauthorized(message)) => {
                warn!(%message, "Persisted token rejected, clearing it");
                self.client.tokens().clear()?;
                self.tx.send_replace(None);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read the signed-in user from the server
    pub async fn refresh(&self) -> Result<Session> {
        if self.current().is_none() {
            return Err(SdkError::NotAuthenticated);
        }
        let user = self.client.me().await?;
        self.install(user)
    }

    /// Take a fresh server representation of a user.
    ///
    /// Always cached; replaces the session only when it is the signed-in
    /// user. Returns whether the session changed.
    pub fn on_update(&self, user: &User) -> Result<bool> {
        self.cache.put(user)?;
        let changed = self.tx.send_if_modified(|current| match current {
            Some(session) if session.user_id() == user.id && session.user() != user => {
                *session = Session::new(user.clone());
                true
            }
            _ => false,
        });
        if changed {
            debug!(user_id = %user.id, "Session updated");
        }
        Ok(changed)
    }

    /// Take an authoritative balance reported by a purchase response
    pub fn on_update_balance(&self, code_bits: u64) -> Result<()> {
        let mut updated = None;
        self.tx.send_if_modified(|current| match current {
            Some(session) if session.code_bits() != code_bits => {
                session.user_mut().code_bits = code_bits;
                updated = Some(session.user().clone());
                true
            }
            _ => false,
        });
        if let Some(user) = updated {
            debug!(user_id = %user.id, code_bits, "Balance updated");
            self.cache.put(&user)?;
        }
        Ok(())
    }

    /// Forget the token, the session and everything cached for it
    pub fn logout(&self) -> Result<()> {
        self.client.tokens().clear()?;
        self.cache.clear();
        if let Some(session) = self.tx.send_replace(None) {
            info!(user_id = %session.user_id(), "Signed out");
        }
        Ok(())
    }

    fn establish(&self, auth: AuthResponse) -> Result<Session> {
        self.client.tokens().save(&auth.token)?;
        info!(user_id = %auth.user.id, "Signed in");
        self.install(auth.user)
    }

    fn install(&self, user: User) -> Result<Session> {
        self.cache.put(&user)?;
        let session = Session::new(user);
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }
}
