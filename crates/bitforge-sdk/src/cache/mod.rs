//! Entity cache
//!
//! Keyed store of fetched entities and ordered list queries, with change
//! notifications for views and lazy refetch after invalidation.

mod entity_cache;
mod query;

pub use entity_cache::{CacheEvent, EntityCache};
pub use query::QueryKey;
