//! Sync timing configuration.

use armylist_types::Category;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for automatic sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last change before a push (ms).
    pub quiet_period_ms: u64,
    /// Fallback snapshot poll cadence (ms).
    pub poll_interval_ms: u64,
    /// Full push cadence while a session is active (ms).
    pub push_interval_ms: u64,
    /// Categories the change detector watches.
    pub watched_categories: Vec<Category>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 1_000,
            poll_interval_ms: 2_000,
            push_interval_ms: 60_000,
            watched_categories: Category::ALL.to_vec(),
        }
    }
}

impl SyncConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms.max(1))
    }
}
