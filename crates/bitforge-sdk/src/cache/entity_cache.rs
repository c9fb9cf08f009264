//! In-memory entity cache
//!
//! Entities are stored whole, as JSON, keyed by `(kind, id)`. A put always
//! replaces the full entity; there are no field-level merges, so a stale
//! field can never survive a refetch.
//!
//! Ordered lists (feeds, thread listings, clan browse) are stored separately
//! as id sequences keyed by their [`QueryKey`], and are invalidated explicitly
//! after mutations that could change membership or ordering.

use super::query::QueryKey;
use crate::entity::{Entity, EntityKind};
use crate::error::Result;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Change notification emitted by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Entity stored or replaced
    Put { kind: EntityKind, id: String },
    /// Entity removed
    Invalidated { kind: EntityKind, id: String },
    /// List stored
    ListStored { kind: EntityKind, key: QueryKey },
    /// One list (`Some`) or every list of a kind (`None`) dropped
    ListInvalidated {
        kind: EntityKind,
        key: Option<QueryKey>,
    },
    /// Everything dropped (logout)
    Cleared,
}

impl CacheEvent {
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            CacheEvent::Put { kind, .. }
            | CacheEvent::Invalidated { kind, .. }
            | CacheEvent::ListStored { kind, .. }
            | CacheEvent::ListInvalidated { kind, .. } => Some(*kind),
            CacheEvent::Cleared => None,
        }
    }

    /// Whether this event can change what a view showing `(kind, id)` renders
    pub fn touches(&self, kind: EntityKind, id: &str) -> bool {
        match self {
            CacheEvent::Put { kind: k, id: i } | CacheEvent::Invalidated { kind: k, id: i } => {
                *k == kind && i == id
            }
            CacheEvent::Cleared => true,
            _ => false,
        }
    }

    /// Whether this event can change a list of `kind`
    pub fn touches_kind(&self, kind: EntityKind) -> bool {
        self.kind().map_or(true, |k| k == kind)
    }
}

const EVENT_CAPACITY: usize = 256;

/// In-memory keyed store of fetched entities
pub struct EntityCache {
    entries: DashMap<(EntityKind, String), Value>,
    lists: DashMap<(EntityKind, QueryKey), Vec<String>>,
    events: broadcast::Sender<CacheEvent>,
}

impl EntityCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: DashMap::new(),
            lists: DashMap::new(),
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    // ==================== Entities ====================

    /// Raw JSON of a cached entity
    pub fn get_raw(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.entries
            .get(&(kind, id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Typed cached entity
    pub fn get<T: Entity>(&self, id: &str) -> Option<T> {
        let value = self.get_raw(T::KIND, id)?;
        match serde_json::from_value(value) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(kind = %T::KIND, entity_id = id, error = %e, "Dropping undecodable cache entry");
                self.invalidate(T::KIND, id);
                None
            }
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.entries.contains_key(&(kind, id.to_string()))
    }

    /// Store an entity, replacing any previous version entirely
    pub fn put<T: Entity>(&self, entity: &T) -> Result<()> {
        let value = serde_json::to_value(entity)?;
        self.put_raw(T::KIND, entity.entity_id(), value);
        Ok(())
    }

    pub fn put_raw(&self, kind: EntityKind, id: &str, value: Value) {
        debug!(%kind, entity_id = id, "Cache put");
        self.entries.insert((kind, id.to_string()), value);
        self.emit(CacheEvent::Put {
            kind,
            id: id.to_string(),
        });
    }

    /// Drop an entity. Returns whether it was present.
    pub fn invalidate(&self, kind: EntityKind, id: &str) -> bool {
        let removed = self.entries.remove(&(kind, id.to_string())).is_some();
        if removed {
            debug!(%kind, entity_id = id, "Cache invalidate");
            self.emit(CacheEvent::Invalidated {
                kind,
                id: id.to_string(),
            });
        }
        removed
    }

    // ==================== Lists ====================

    /// Ordered ids of a cached list query
    pub fn list(&self, kind: EntityKind, key: &QueryKey) -> Option<Vec<String>> {
        self.lists
            .get(&(kind, key.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn put_list(&self, kind: EntityKind, key: QueryKey, ids: Vec<String>) {
        debug!(%kind, key = %key, len = ids.len(), "Cache put list");
        self.lists.insert((kind, key.clone()), ids);
        self.emit(CacheEvent::ListStored { kind, key });
    }

    /// Resolve a cached list to entities.
    ///
    /// Returns `None` when the list is absent or any member entity has been
    /// invalidated since, which callers treat as a miss.
    pub fn list_entities<T: Entity>(&self, key: &QueryKey) -> Option<Vec<T>> {
        let ids = self.list(T::KIND, key)?;
        ids.iter().map(|id| self.get::<T>(id)).collect()
    }

    pub fn invalidate_list(&self, kind: EntityKind, key: &QueryKey) -> bool {
        let removed = self.lists.remove(&(kind, key.clone())).is_some();
        if removed {
            self.emit(CacheEvent::ListInvalidated {
                kind,
                key: Some(key.clone()),
            });
        }
        removed
    }

    /// Drop every list of `kind`. Returns how many were dropped.
    pub fn invalidate_lists(&self, kind: EntityKind) -> usize {
        let before = self.lists.len();
        self.lists.retain(|(k, _), _| *k != kind);
        let removed = before.saturating_sub(self.lists.len());
        debug!(%kind, removed, "Cache invalidate lists");
        self.emit(CacheEvent::ListInvalidated { kind, key: None });
        removed
    }

    // ==================== Lazy refetch ====================

    /// Cached entity, or fetch and cache it
    pub async fn fetch_entity<T, F, Fut>(&self, id: &str, fetcher: F) -> Result<T>
    where
        T: Entity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(entity) = self.get::<T>(id) {
            return Ok(entity);
        }
        let entity = fetcher().await?;
        self.put(&entity)?;
        Ok(entity)
    }

    /// Cached list, or fetch it and cache both the entities and the ordering
    pub async fn fetch_list<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Vec<T>>
    where
        T: Entity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(entities) = self.list_entities::<T>(key) {
            return Ok(entities);
        }
        let entities = fetcher().await?;
        self.store_list(key, &entities)?;
        Ok(entities)
    }

    /// Store a freshly fetched list and its entities
    pub fn store_list<T: Entity>(&self, key: &QueryKey, entities: &[T]) -> Result<()> {
        for entity in entities {
            self.put(entity)?;
        }
        let ids = entities.iter().map(|e| e.entity_id().to_string()).collect();
        self.put_list(T::KIND, key.clone(), ids);
        Ok(())
    }

    // ==================== Maintenance ====================

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything (logout)
    pub fn clear(&self) {
        self.entries.clear();
        self.lists.clear();
        self.emit(CacheEvent::Cleared);
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use bitforge_client::types::{Clan, User};

    fn clan(id: &str, members: &[&str]) -> Clan {
        Clan {
            id: id.into(),
            name: format!("Clan {}", id),
            tag: id.to_uppercase(),
            description: None,
            owner_id: None,
            members: members.iter().map(|m| m.to_string()).collect(),
            created_at: None,
        }
    }

    #[test]
    fn test_put_replaces_whole_entity() {
        let cache = EntityCache::new();
        let mut c = clan("c1", &["u1"]);
        c.description = Some("old".into());
        cache.put(&c).unwrap();

        let replacement = clan("c1", &["u1", "u2"]);
        cache.put(&replacement).unwrap();

        let cached: Clan = cache.get("c1").unwrap();
        assert_eq!(cached, replacement);
        assert!(cached.description.is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = EntityCache::new();
        cache.put(&clan("c1", &[])).unwrap();
        assert!(cache.invalidate(EntityKind::Clan, "c1"));
        assert!(!cache.invalidate(EntityKind::Clan, "c1"));
        assert!(cache.get::<Clan>("c1").is_none());
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let cache = EntityCache::new();
        cache.put(&clan("x", &[])).unwrap();
        assert!(cache.get::<User>("x").is_none());
        assert!(cache.contains(EntityKind::Clan, "x"));
    }

    #[test]
    fn test_lists_are_keyed_by_params() {
        let cache = EntityCache::new();
        let by_members = QueryKey::new("clans").param("sort", "members");
        let by_name = QueryKey::new("clans").param("sort", "name");

        cache.store_list(&by_members, &[clan("b", &["1", "2"]), clan("a", &["1"])]).unwrap();
        cache.store_list(&by_name, &[clan("a", &["1"]), clan("b", &["1", "2"])]).unwrap();

        assert_eq!(cache.list(EntityKind::Clan, &by_members).unwrap(), vec!["b", "a"]);
        assert_eq!(cache.list(EntityKind::Clan, &by_name).unwrap(), vec!["a", "b"]);

        assert!(cache.invalidate_list(EntityKind::Clan, &by_name));
        assert!(cache.list(EntityKind::Clan, &by_name).is_none());
        assert!(cache.list(EntityKind::Clan, &by_members).is_some());

        assert_eq!(cache.invalidate_lists(EntityKind::Clan), 1);
        assert!(cache.list(EntityKind::Clan, &by_members).is_none());
        // Entities themselves survive list invalidation
        assert!(cache.get::<Clan>("a").is_some());
    }

    #[test]
    fn test_list_with_missing_member_is_a_miss() {
        let cache = EntityCache::new();
        let key = QueryKey::new("clans");
        cache.store_list(&key, &[clan("a", &[]), clan("b", &[])]).unwrap();
        cache.invalidate(EntityKind::Clan, "b");
        assert!(cache.list_entities::<Clan>(&key).is_none());
    }

    #[tokio::test]
    async fn test_fetch_entity_is_lazy() {
        let cache = EntityCache::new();
        let first: Clan = cache
            .fetch_entity("c1", || async { Ok(clan("c1", &["u1"])) })
            .await
            .unwrap();
        assert_eq!(first.members, vec!["u1"]);

        // Cached now, the fetcher must not run
        let second: Clan = cache
            .fetch_entity("c1", || async {
                Err(SdkError::Config("fetcher should not run".into()))
            })
            .await
            .unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_fetch_list_refetches_after_invalidation() {
        let cache = EntityCache::new();
        let key = QueryKey::new("clans").param("sort", "members");

        let list: Vec<Clan> = cache
            .fetch_list(&key, || async { Ok(vec![clan("a", &[])]) })
            .await
            .unwrap();
        assert_eq!(list.len(), 1);

        cache.invalidate_lists(EntityKind::Clan);
        let list: Vec<Clan> = cache
            .fetch_list(&key, || async { Ok(vec![clan("a", &[]), clan("b", &[])]) })
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let cache = EntityCache::new();
        let mut rx = cache.subscribe();
        cache.put(&clan("c1", &[])).unwrap();
        cache.invalidate(EntityKind::Clan, "c1");

        let put = rx.recv().await.unwrap();
        assert!(put.touches(EntityKind::Clan, "c1"));
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheEvent::Invalidated {
                kind: EntityKind::Clan,
                id: "c1".into()
            }
        );
    }
}
