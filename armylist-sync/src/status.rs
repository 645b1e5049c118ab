//! Sync progress reporting.

use crate::error::SyncError;
use armylist_types::SyncTimestamp;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Callbacks for push lifecycle events. All methods default to no-ops.
pub trait SyncObserver: Send + Sync {
    fn on_sync_start(&self) {}

    fn on_sync_success(&self, _last_synced: SyncTimestamp) {}

    fn on_sync_failure(&self, _error: &SyncError) {}

    /// A started push finished after its session was torn down. Its outcome
    /// is not reported.
    fn on_sync_abandoned(&self) {}
}

/// Point-in-time view of a session's sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_syncing: bool,
    pub last_synced_at: Option<SyncTimestamp>,
    pub last_error: Option<String>,
}

/// Records push outcomes for observability and forwards them to an
/// optional caller observer.
///
/// Pushes can overlap, so `is_syncing` holds while any started push has not
/// finished.
#[derive(Default)]
pub struct SyncStatus {
    state: Mutex<StatusState>,
    forward: Option<Arc<dyn SyncObserver>>,
}

#[derive(Default)]
struct StatusState {
    in_flight: usize,
    last_synced_at: Option<SyncTimestamp>,
    last_error: Option<String>,
}

impl StatusState {
    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also reports every event to `observer`.
    pub fn with_observer(observer: Arc<dyn SyncObserver>) -> Self {
        Self {
            state: Mutex::new(StatusState::default()),
            forward: Some(observer),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.lock();
        StatusSnapshot {
            is_syncing: state.in_flight > 0,
            last_synced_at: state.last_synced_at,
            last_error: state.last_error.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncObserver for SyncStatus {
    fn on_sync_start(&self) {
        self.lock().in_flight += 1;
        if let Some(forward) = &self.forward {
            forward.on_sync_start();
        }
    }

    fn on_sync_success(&self, last_synced: SyncTimestamp) {
        {
            let mut state = self.lock();
            state.finish();
            state.last_synced_at = Some(last_synced);
            state.last_error = None;
        }
        if let Some(forward) = &self.forward {
            forward.on_sync_success(last_synced);
        }
    }

    fn on_sync_failure(&self, error: &SyncError) {
        {
            let mut state = self.lock();
            state.finish();
            state.last_error = Some(error.to_string());
        }
        if let Some(forward) = &self.forward {
            forward.on_sync_failure(error);
        }
    }

    fn on_sync_abandoned(&self) {
        self.lock().finish();
    }
}

impl fmt::Debug for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStatus")
            .field("state", &self.snapshot())
            .field("forward", &self.forward.is_some())
            .finish()
    }
}
