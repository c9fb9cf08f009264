//! Refresh and debounce timing

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing for background refreshes and input debouncing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Activity feed refresh interval (default: 60s)
    #[serde(default = "default_feed_poll_ms")]
    pub feed_poll_ms: u64,
    /// Quiet period before a user search is sent (default: 400ms)
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Live-user presence refresh interval (default: 30s)
    #[serde(default = "default_presence_poll_ms")]
    pub presence_poll_ms: u64,
    /// Feed page size
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,
}

fn default_feed_poll_ms() -> u64 {
    60_000
}
fn default_search_debounce_ms() -> u64 {
    400
}
fn default_presence_poll_ms() -> u64 {
    30_000
}
fn default_feed_limit() -> u32 {
    20
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            feed_poll_ms: default_feed_poll_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            presence_poll_ms: default_presence_poll_ms(),
            feed_limit: default_feed_limit(),
        }
    }
}

impl SyncConfig {
    pub fn feed_poll(&self) -> Duration {
        Duration::from_millis(self.feed_poll_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn presence_poll(&self) -> Duration {
        Duration::from_millis(self.presence_poll_ms)
    }
}
