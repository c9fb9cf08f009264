//! Shared collaborators handed to every view

use crate::cache::EntityCache;
use crate::capability::{capabilities, Capability, CapabilitySet};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::mutation::MutationExecutor;
use crate::session::{Session, SessionHandle, SessionStore};
use bitforge_client::ApiClient;
use std::sync::Arc;
use tracing::warn;

/// Everything a view needs, passed explicitly.
///
/// Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct AppContext {
    pub client: ApiClient,
    pub cache: Arc<EntityCache>,
    pub executor: Arc<MutationExecutor>,
    pub session: Arc<SessionStore>,
    pub sync: SyncConfig,
}

impl AppContext {
    pub fn new(client: ApiClient, sync: SyncConfig) -> Self {
        let cache = Arc::new(EntityCache::new());
        let executor = Arc::new(MutationExecutor::new(cache.clone()));
        let session = Arc::new(SessionStore::new(client.clone(), cache.clone()));
        Self {
            client,
            cache,
            executor,
            session,
            sync,
        }
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session.handle()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        capabilities(self.session.current().as_ref())
    }

    /// The signed-in session, provided it holds `capability`
    pub fn require(&self, capability: Capability) -> Result<Session> {
        let session = self.session_handle().require()?;
        capabilities(Some(&session)).check(capability)?;
        Ok(session)
    }

    /// Re-read the signed-in user after a mutation that changed it server-side.
    ///
    /// The mutation itself already succeeded, so a failed refresh is logged
    /// and the stale session kept until the next one.
    pub async fn refresh_session(&self) {
        if let Err(e) = self.session.refresh().await {
            warn!(error = %e, "Session refresh failed");
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("client", &self.client)
            .field("cached_entities", &self.cache.len())
            .field("sync", &self.sync)
            .finish()
    }
}
