//! Push scheduling.
//!
//! Two independent actors decide *when* to push:
//! - [`DebounceScheduler`] coalesces bursts of change notifications
//! - [`IntervalScheduler`] pushes on a fixed cadence and on activation
//!
//! Both run the same [`Pusher`] job. Neither serializes against the other;
//! the service's per-identity gate does.

mod debounce;
mod interval;

pub use debounce::DebounceScheduler;
pub use interval::IntervalScheduler;

use crate::error::{SyncError, SyncResult};
use crate::service::SyncService;
use crate::session::SyncSession;
use crate::status::SyncObserver;
use armylist_types::SyncTimestamp;
use std::sync::Arc;
use tracing::{debug, warn};

/// One push on behalf of a session, with observer reporting.
#[derive(Clone)]
pub struct Pusher {
    service: Arc<SyncService>,
    session: Arc<SyncSession>,
    observer: Arc<dyn SyncObserver>,
}

impl Pusher {
    pub fn new(
        service: Arc<SyncService>,
        session: Arc<SyncSession>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            service,
            session,
            observer,
        }
    }

    pub fn session(&self) -> &Arc<SyncSession> {
        &self.session
    }

    /// Pushes once if the session is active.
    ///
    /// Outcomes are reported to the observer only while the session is
    /// still active; a push that completes after teardown is logged and
    /// otherwise dropped.
    pub async fn run(&self) -> SyncResult<SyncTimestamp> {
        if !self.session.is_active() {
            return Err(SyncError::SessionClosed);
        }

        self.observer.on_sync_start();
        let result = self.service.push(self.session.identity()).await;

        if !self.session.is_active() {
            debug!(
                "Discarding push outcome for inactive session {}",
                self.session.identity()
            );
            self.observer.on_sync_abandoned();
            return result;
        }

        match &result {
            Ok(at) => self.observer.on_sync_success(*at),
            Err(e) => {
                warn!("Push for {} failed: {}", self.session.identity(), e);
                self.observer.on_sync_failure(e);
            }
        }
        result
    }
}
