//! Records of in-flight optimistic updates

use crate::entity::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Pending,
    Committed,
    RolledBack,
}

/// An optimistic update between local apply and server resolution.
///
/// Lives in the executor only while the remote call is outstanding; the
/// resolved record (committed or rolled back) is broadcast once and dropped.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMutation {
    pub mutation_id: Uuid,
    pub kind: EntityKind,
    pub entity_id: String,
    pub operation: String,
    /// Top-level fields the local patch touched
    pub changed_fields: Vec<String>,
    pub previous: Option<Value>,
    pub provisional: Option<Value>,
    pub status: MutationStatus,
    /// Failure text when rolled back
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl PendingMutation {
    pub fn new(
        kind: EntityKind,
        entity_id: impl Into<String>,
        operation: impl Into<String>,
        previous: Option<Value>,
        provisional: Option<Value>,
    ) -> Self {
        Self {
            mutation_id: Uuid::new_v4(),
            kind,
            entity_id: entity_id.into(),
            operation: operation.into(),
            changed_fields: changed_fields(previous.as_ref(), provisional.as_ref()),
            previous,
            provisional,
            status: MutationStatus::Pending,
            error: None,
            started_at: Utc::now(),
        }
    }
}

/// Top-level keys whose values differ between two JSON objects
pub fn changed_fields(previous: Option<&Value>, next: Option<&Value>) -> Vec<String> {
    let empty = serde_json::Map::new();
    let prev = previous.and_then(Value::as_object).unwrap_or(&empty);
    let next = match next.and_then(Value::as_object) {
        Some(obj) => obj,
        None => return Vec::new(),
    };

    let keys: BTreeSet<&String> = prev.keys().chain(next.keys()).collect();
    keys.into_iter()
        .filter(|k| prev.get(*k) != next.get(*k))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_fields() {
        let prev = json!({"id": "u2", "followers": [], "codeBits": 5});
        let next = json!({"id": "u2", "followers": ["u1"], "codeBits": 5});
        assert_eq!(changed_fields(Some(&prev), Some(&next)), vec!["followers"]);
    }

    #[test]
    fn test_no_provisional_value() {
        let prev = json!({"id": "u2"});
        assert!(changed_fields(Some(&prev), None).is_empty());
    }
}
