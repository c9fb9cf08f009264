//! Optimistic mutation executor
//!
//! Applies a local patch to the cache immediately, issues the remote call,
//! then either replaces the entity with the server's response or restores
//! the snapshot taken before the patch.
//!
//! Guarantees:
//! - Mutations on the same `(kind, id)` run one at a time. A second mutation
//!   waits until the first commits or rolls back before snapshotting.
//! - A repeated `(kind, id, operation)` while the first is still in flight is
//!   ignored; no second remote call is dispatched.
//! - If the caller drops the future mid-flight, the snapshot is restored and
//!   all bookkeeping released.
//! - A rollback only touches the cache if it still holds the provisional
//!   value. A fresher copy written meanwhile (refetch, poll) is kept.

use super::pending::{MutationStatus, PendingMutation};
use crate::cache::EntityCache;
use crate::entity::{Entity, EntityKind};
use crate::error::Result;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

type LockKey = (EntityKind, String);
type FlightKey = (EntityKind, String, String);

/// Local change applied before the server confirms
pub type Patch<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Description of a state-changing action on one entity
pub struct Mutation<T> {
    id: String,
    operation: String,
    patch: Option<Patch<T>>,
    placeholder: Option<T>,
    invalidates: Vec<EntityKind>,
}

impl<T: Entity> Mutation<T> {
    /// Mutation of entity `id`. `operation` names the action ("follow",
    /// "join") and scopes duplicate suppression.
    pub fn new(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            patch: None,
            placeholder: None,
            invalidates: Vec::new(),
        }
    }

    /// Creation of a new entity. `placeholder` is cached under its own id
    /// until the server answers with the real record, then dropped.
    pub fn create(operation: impl Into<String>, placeholder: T) -> Self {
        Self {
            id: placeholder.entity_id().to_string(),
            operation: operation.into(),
            patch: None,
            placeholder: Some(placeholder),
            invalidates: Vec::new(),
        }
    }

    /// Provisional change shown until the server answers
    pub fn with_patch<F>(mut self, patch: F) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.patch = Some(Box::new(patch));
        self
    }

    /// Drop every cached list of `kind` once committed
    pub fn invalidates(mut self, kind: EntityKind) -> Self {
        if !self.invalidates.contains(&kind) {
            self.invalidates.push(kind);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl<T> std::fmt::Debug for Mutation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("has_patch", &self.patch.is_some())
            .field("has_placeholder", &self.placeholder.is_some())
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

/// Result of a mutation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    /// Server accepted; carries its authoritative representation
    Committed(T),
    /// Same operation already in flight for this entity; nothing dispatched
    Ignored,
}

impl<T> MutationOutcome<T> {
    pub fn is_ignored(&self) -> bool {
        matches!(self, MutationOutcome::Ignored)
    }

    pub fn committed(self) -> Option<T> {
        match self {
            MutationOutcome::Committed(value) => Some(value),
            MutationOutcome::Ignored => None,
        }
    }
}

const EVENT_CAPACITY: usize = 64;

/// Runs optimistic mutations against the [`EntityCache`]
pub struct MutationExecutor {
    cache: Arc<EntityCache>,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    in_flight: DashSet<FlightKey>,
    pending: DashMap<Uuid, PendingMutation>,
    events: broadcast::Sender<PendingMutation>,
}

impl MutationExecutor {
    pub fn new(cache: Arc<EntityCache>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            cache,
            locks: DashMap::new(),
            in_flight: DashSet::new(),
            pending: DashMap::new(),
            events,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Resolved mutations (committed or rolled back), for transient notices
    pub fn subscribe(&self) -> broadcast::Receiver<PendingMutation> {
        self.events.subscribe()
    }

    /// Mutations whose remote call is outstanding
    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<_> = self.pending.iter().map(|e| e.value().clone()).collect();
        pending.sort_by_key(|p| p.started_at);
        pending
    }

    pub fn is_in_flight(&self, kind: EntityKind, id: &str, operation: &str) -> bool {
        self.in_flight
            .contains(&(kind, id.to_string(), operation.to_string()))
    }

    /// Apply `mutation` optimistically and reconcile with `remote`.
    ///
    /// On success the cache holds exactly what `remote` returned. On failure
    /// the cache holds exactly what it held before the patch, and the error
    /// is returned for user-facing messaging.
    pub async fn mutate<T, F, Fut>(&self, mutation: Mutation<T>, remote: F) -> Result<MutationOutcome<T>>
    where
        T: Entity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Mutation {
            id,
            operation,
            patch,
            placeholder,
            invalidates,
        } = mutation;

        let mut flight = match self.begin(T::KIND, &id, &operation).await {
            Some(flight) => flight,
            None => return Ok(MutationOutcome::Ignored),
        };

        let snapshot = self.cache.get_raw(T::KIND, &id);
        let provisional = match (patch, placeholder, snapshot.as_ref()) {
            (Some(patch), _, Some(current)) => {
                let mut entity: T = serde_json::from_value(current.clone())?;
                patch(&mut entity);
                Some(serde_json::to_value(&entity)?)
            }
            (_, Some(placeholder), None) => Some(serde_json::to_value(&placeholder)?),
            (Some(_), _, None) => {
                debug!(kind = %T::KIND, entity_id = %id, %operation, "Entity not cached, no optimistic patch");
                None
            }
            _ => None,
        };

        let applied = provisional.clone().or_else(|| snapshot.clone());
        flight.track(snapshot, provisional.clone(), applied);
        if let Some(value) = provisional {
            self.cache.put_raw(T::KIND, &id, value);
        }

        match remote().await {
            Ok(entity) => {
                if entity.entity_id() != id {
                    // Provisional value lives under a placeholder id
                    flight.restore_snapshot();
                }
                self.cache.put(&entity)?;
                for kind in &invalidates {
                    self.cache.invalidate_lists(*kind);
                }
                flight.resolve(MutationStatus::Committed, None);
                info!(kind = %T::KIND, entity_id = %entity.entity_id(), %operation, "Mutation committed");
                Ok(MutationOutcome::Committed(entity))
            }
            Err(e) => {
                flight.resolve(MutationStatus::RolledBack, Some(e.to_string()));
                warn!(kind = %T::KIND, entity_id = %id, %operation, error = %e, "Mutation rolled back");
                Err(e)
            }
        }
    }

    /// Optimistically remove an entity; restore it if `remote` fails.
    pub async fn remove<T, F, Fut>(
        &self,
        id: &str,
        operation: &str,
        invalidates: &[EntityKind],
        remote: F,
    ) -> Result<MutationOutcome<()>>
    where
        T: Entity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut flight = match self.begin(T::KIND, id, operation).await {
            Some(flight) => flight,
            None => return Ok(MutationOutcome::Ignored),
        };

        let snapshot = self.cache.get_raw(T::KIND, id);
        flight.track(snapshot, None, None);
        self.cache.invalidate(T::KIND, id);

        match remote().await {
            Ok(()) => {
                self.cache.invalidate_lists(T::KIND);
                for kind in invalidates {
                    self.cache.invalidate_lists(*kind);
                }
                flight.resolve(MutationStatus::Committed, None);
                info!(kind = %T::KIND, entity_id = id, operation, "Removal committed");
                Ok(MutationOutcome::Committed(()))
            }
            Err(e) => {
                flight.resolve(MutationStatus::RolledBack, Some(e.to_string()));
                warn!(kind = %T::KIND, entity_id = id, operation, error = %e, "Removal rolled back");
                Err(e)
            }
        }
    }

    /// Claim the in-flight slot and the per-entity serialization lock
    async fn begin(&self, kind: EntityKind, id: &str, operation: &str) -> Option<Flight<'_>> {
        let flight_key = (kind, id.to_string(), operation.to_string());
        if !self.in_flight.insert(flight_key.clone()) {
            debug!(%kind, entity_id = id, operation, "Duplicate mutation ignored");
            return None;
        }

        let mut flight = Flight {
            executor: self,
            flight_key,
            record_id: None,
            snapshot: None,
            applied: None,
            serial: None,
        };

        let lock = self
            .locks
            .entry((kind, id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        flight.serial = Some(lock.lock_owned().await);
        Some(flight)
    }

    fn release_lock(&self, kind: EntityKind, id: &str) {
        self.locks
            .remove_if(&(kind, id.to_string()), |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Bookkeeping for one mutation; cleans up on every exit path
struct Flight<'a> {
    executor: &'a MutationExecutor,
    flight_key: FlightKey,
    record_id: Option<Uuid>,
    /// Armed rollback: the pre-patch value (`Some(None)` = was absent)
    snapshot: Option<Option<Value>>,
    /// What this mutation left in the cache after patching
    applied: Option<Value>,
    serial: Option<OwnedMutexGuard<()>>,
}

impl Flight<'_> {
    fn track(&mut self, snapshot: Option<Value>, provisional: Option<Value>, applied: Option<Value>) {
        let (kind, id, operation) = &self.flight_key;
        let record = PendingMutation::new(
            *kind,
            id.clone(),
            operation.clone(),
            snapshot.clone(),
            provisional,
        );
        self.record_id = Some(record.mutation_id);
        self.executor.pending.insert(record.mutation_id, record);
        self.snapshot = Some(snapshot);
        self.applied = applied;
    }

    fn restore_snapshot(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let (kind, id, _) = &self.flight_key;
        let cache = &self.executor.cache;
        if cache.get_raw(*kind, id) != self.applied.take() {
            debug!(%kind, entity_id = %id, "Cache changed during flight, keeping newer value");
            return;
        }
        match snapshot {
            Some(value) => cache.put_raw(*kind, id, value),
            None => {
                cache.invalidate(*kind, id);
            }
        }
    }

    fn resolve(&mut self, status: MutationStatus, error: Option<String>) {
        if status == MutationStatus::RolledBack {
            self.restore_snapshot();
        } else {
            self.snapshot = None;
        }

        if let Some(record_id) = self.record_id.take() {
            if let Some((_, mut record)) = self.executor.pending.remove(&record_id) {
                record.status = status;
                record.error = error;
                let _ = self.executor.events.send(record);
            }
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.record_id.is_some() || self.snapshot.is_some() {
            let (kind, id, operation) = &self.flight_key;
            warn!(%kind, entity_id = %id, %operation, "Mutation abandoned, rolling back");
            self.resolve(MutationStatus::RolledBack, Some("cancelled".to_string()));
        }
        // Restore before the next waiter can snapshot
        self.serial.take();
        let (kind, id, _) = &self.flight_key;
        self.executor.release_lock(*kind, id);
        self.executor.in_flight.remove(&self.flight_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use bitforge_client::types::User;
    use bitforge_client::ClientError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    fn user(id: &str, followers: &[&str]) -> User {
        serde_json::from_value(json!({
            "id": id,
            "username": id,
            "followers": followers,
        }))
        .unwrap()
    }

    fn setup() -> (Arc<EntityCache>, Arc<MutationExecutor>) {
        let cache = Arc::new(EntityCache::new());
        let executor = Arc::new(MutationExecutor::new(cache.clone()));
        (cache, executor)
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    fn follow(by: &'static str) -> Mutation<User> {
        Mutation::new("b", "follow").with_patch(move |u: &mut User| u.followers.push(by.to_string()))
    }

    #[tokio::test]
    async fn test_server_wins_on_success() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();

        let mut server = user("b", &["a"]);
        server.code_bits = 42;
        let expected = server.clone();

        let outcome = executor
            .mutate(follow("a"), || async move { Ok(server) })
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::Committed(expected.clone()));
        assert_eq!(cache.get::<User>("b").unwrap(), expected);
        assert!(executor.pending_mutations().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_restores_snapshot() {
        let (cache, executor) = setup();
        let original = user("b", &["z"]);
        cache.put(&original).unwrap();

        let err = executor
            .mutate(follow("a"), || async {
                Err::<User, _>(SdkError::Remote(ClientError::Network("refused".into())))
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), bitforge_client::ErrorKind::NetworkFailure);
        assert_eq!(cache.get::<User>("b").unwrap(), original);
        assert!(!executor.is_in_flight(EntityKind::User, "b", "follow"));
    }

    #[tokio::test]
    async fn test_rollback_of_uncached_entity_leaves_it_absent() {
        let (cache, executor) = setup();
        let result = executor
            .mutate(follow("a"), || async {
                Err::<User, _>(SdkError::Remote(ClientError::Server {
                    status: 500,
                    message: "boom".into(),
                }))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get::<User>("b").is_none());
    }

    #[tokio::test]
    async fn test_provisional_value_visible_while_pending() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();
        let (tx, rx) = oneshot::channel::<User>();

        let exec = executor.clone();
        let handle = tokio::spawn(async move {
            exec.mutate(follow("a"), || async move { Ok(rx.await.unwrap()) })
                .await
        });

        settle(|| executor.pending_mutations().len() == 1).await;
        assert_eq!(cache.get::<User>("b").unwrap().followers, vec!["a"]);
        let pending = &executor.pending_mutations()[0];
        assert_eq!(pending.status, MutationStatus::Pending);
        assert_eq!(pending.changed_fields, vec!["followers"]);

        tx.send(user("b", &["a"])).unwrap();
        handle.await.unwrap().unwrap();
        assert!(executor.pending_mutations().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_trigger_dispatches_once() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, rx) = oneshot::channel::<User>();

        let exec = executor.clone();
        let counter = calls.clone();
        let first = tokio::spawn(async move {
            exec.mutate(follow("a"), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(rx.await.unwrap())
            })
            .await
        });
        settle(|| calls.load(Ordering::SeqCst) == 1).await;

        let counter = calls.clone();
        let second = executor
            .mutate(follow("a"), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(user("b", &["a", "a"]))
            })
            .await
            .unwrap();
        assert!(second.is_ignored());

        tx.send(user("b", &["a"])).unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Not double-toggled
        assert_eq!(cache.get::<User>("b").unwrap().followers, vec!["a"]);
    }

    #[tokio::test]
    async fn test_same_entity_mutations_are_serialized() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();
        let (tx1, rx1) = oneshot::channel::<User>();
        let (tx2, rx2) = oneshot::channel::<User>();

        let exec = executor.clone();
        let first = tokio::spawn(async move {
            exec.mutate(follow("a"), || async move { Ok(rx1.await.unwrap()) })
                .await
        });
        settle(|| executor.pending_mutations().len() == 1).await;

        let exec = executor.clone();
        let second = tokio::spawn(async move {
            let rename = Mutation::<User>::new("b", "rename")
                .with_patch(|u: &mut User| u.display_name = Some("Bee".into()));
            exec.mutate(rename, || async move { Ok(rx2.await.unwrap()) })
                .await
        });

        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        // Second is parked behind the first: its patch is not applied yet
        assert_eq!(executor.pending_mutations().len(), 1);
        assert!(cache.get::<User>("b").unwrap().display_name.is_none());

        let mut confirmed = user("b", &["a"]);
        confirmed.bio = Some("from server".into());
        tx1.send(confirmed).unwrap();
        first.await.unwrap().unwrap();

        settle(|| executor.pending_mutations().len() == 1).await;
        // Second patch applies on top of the first's server response
        let provisional = cache.get::<User>("b").unwrap();
        assert_eq!(provisional.display_name.as_deref(), Some("Bee"));
        assert_eq!(provisional.bio.as_deref(), Some("from server"));

        let mut final_user = user("b", &["a"]);
        final_user.display_name = Some("Bee".into());
        tx2.send(final_user.clone()).unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(cache.get::<User>("b").unwrap(), final_user);
    }

    #[tokio::test]
    async fn test_abandoned_mutation_rolls_back() {
        let (cache, executor) = setup();
        let original = user("b", &[]);
        cache.put(&original).unwrap();
        let (_tx, rx) = oneshot::channel::<User>();

        let exec = executor.clone();
        let handle = tokio::spawn(async move {
            exec.mutate(follow("a"), || async move { Ok(rx.await.unwrap()) })
                .await
        });
        settle(|| executor.pending_mutations().len() == 1).await;
        assert_eq!(cache.get::<User>("b").unwrap().followers, vec!["a"]);

        handle.abort();
        let _ = handle.await;

        assert_eq!(cache.get::<User>("b").unwrap(), original);
        assert!(executor.pending_mutations().is_empty());
        assert!(!executor.is_in_flight(EntityKind::User, "b", "follow"));
    }

    #[tokio::test]
    async fn test_create_shows_placeholder_until_server_assigns_id() {
        let (cache, executor) = setup();
        let (tx, rx) = oneshot::channel::<User>();

        let exec = executor.clone();
        let handle = tokio::spawn(async move {
            let mutation = Mutation::create("signup", user("pending:neo", &[]));
            exec.mutate(mutation, || async move { Ok(rx.await.unwrap()) })
                .await
        });

        settle(|| executor.pending_mutations().len() == 1).await;
        assert!(cache.get::<User>("pending:neo").is_some());

        tx.send(user("u42", &[])).unwrap();
        let created = handle.await.unwrap().unwrap().committed().unwrap();

        assert_eq!(created.id, "u42");
        assert!(cache.get::<User>("pending:neo").is_none());
        assert_eq!(cache.get::<User>("u42").unwrap(), created);
    }

    #[tokio::test]
    async fn test_failed_create_drops_placeholder() {
        let (cache, executor) = setup();
        let result = executor
            .mutate(Mutation::create("signup", user("pending:neo", &[])), || async {
                Err::<User, _>(SdkError::validation("username", "taken"))
            })
            .await;

        assert!(result.is_err());
        assert!(cache.get::<User>("pending:neo").is_none());
    }

    #[tokio::test]
    async fn test_rollback_keeps_fresher_copy() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let exec = executor.clone();
        let handle = tokio::spawn(async move {
            exec.mutate(follow("a"), || async move {
                rx.await.unwrap();
                Err::<User, _>(SdkError::Remote(ClientError::Network("reset".into())))
            })
            .await
        });
        settle(|| executor.pending_mutations().len() == 1).await;

        // A refetch lands while the follow is outstanding
        let mut refreshed = user("b", &["c"]);
        refreshed.bio = Some("refetched".into());
        cache.put(&refreshed).unwrap();

        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_err());
        assert_eq!(cache.get::<User>("b").unwrap(), refreshed);
    }

    #[tokio::test]
    async fn test_remove_rolls_back_on_failure() {
        let (cache, executor) = setup();
        let original = user("b", &[]);
        cache.put(&original).unwrap();

        let result = executor
            .remove::<User, _, _>("b", "delete", &[], || async {
                Err(SdkError::Remote(ClientError::Unauthorized("nope".into())))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get::<User>("b").unwrap(), original);

        executor
            .remove::<User, _, _>("b", "delete", &[], || async { Ok(()) })
            .await
            .unwrap();
        assert!(cache.get::<User>("b").is_none());
    }

    #[tokio::test]
    async fn test_resolution_is_broadcast() {
        let (cache, executor) = setup();
        cache.put(&user("b", &[])).unwrap();
        let mut events = executor.subscribe();

        let _ = executor
            .mutate(follow("a"), || async {
                Err::<User, _>(SdkError::validation("user", "blocked"))
            })
            .await;

        let record = events.recv().await.unwrap();
        assert_eq!(record.status, MutationStatus::RolledBack);
        assert_eq!(record.operation, "follow");
        assert!(record.error.unwrap().contains("blocked"));
    }
}
