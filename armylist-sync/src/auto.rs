//! Automatic sync for one session.
//!
//! Wires the debounce and interval schedulers to a session and enables the
//! change detector for it. Everything stops when the [`AutoSync`] is stopped
//! or dropped.

use crate::config::SyncConfig;
use crate::detector::{ChangeDetector, DetectorTask};
use crate::error::SyncResult;
use crate::scheduler::{DebounceScheduler, IntervalScheduler, Pusher};
use crate::service::{PullOutcome, SyncService};
use crate::session::SyncSession;
use crate::status::{StatusSnapshot, SyncObserver, SyncStatus};
use armylist_storage::{ChangeEmitter, StorageEvents};
use armylist_types::SyncTimestamp;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Everything [`AutoSync::start`] attaches to.
pub struct AutoSyncParts<'a> {
    pub service: Arc<SyncService>,
    pub detector: Arc<ChangeDetector>,
    pub events: StorageEvents,
    pub emitter: &'a ChangeEmitter,
    pub config: &'a SyncConfig,
    pub observer: Option<Arc<dyn SyncObserver>>,
}

pub struct AutoSync {
    session: Arc<SyncSession>,
    service: Arc<SyncService>,
    status: Arc<SyncStatus>,
    debounce: Arc<DebounceScheduler>,
    interval: IntervalScheduler,
    detector: Arc<ChangeDetector>,
    detector_task: Mutex<Option<DetectorTask>>,
}

impl AutoSync {
    /// Starts automatic sync for `session`. The interval scheduler pushes
    /// immediately. Must be called within a tokio runtime.
    pub fn start(session: Arc<SyncSession>, parts: AutoSyncParts<'_>) -> Self {
        let status = Arc::new(match parts.observer {
            Some(observer) => SyncStatus::with_observer(observer),
            None => SyncStatus::new(),
        });
        let pusher = Pusher::new(parts.service.clone(), session.clone(), status.clone());
        let debounce = Arc::new(DebounceScheduler::new(
            pusher.clone(),
            parts.config.quiet_period(),
        ));
        let interval = IntervalScheduler::new(pusher, parts.config.push_interval());

        parts.detector.enable(session.clone(), debounce.clone());
        let detector_task =
            parts
                .detector
                .spawn(parts.events, parts.emitter, parts.config.poll_interval());
        interval.start();

        info!("Automatic sync started for {}", session.identity());
        Self {
            session,
            service: parts.service,
            status,
            debounce,
            interval,
            detector: parts.detector,
            detector_task: Mutex::new(Some(detector_task)),
        }
    }

    pub fn session(&self) -> &Arc<SyncSession> {
        &self.session
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_running()
    }

    /// Pushes immediately, outside the schedule.
    pub async fn sync_now(&self) -> SyncResult<SyncTimestamp> {
        self.interval.sync_now().await
    }

    /// Pulls remote data over local storage, then rebaselines the detector
    /// so the restored data is not pushed back as a local change.
    ///
    /// The detector is paused for the whole pull and a push scheduled before
    /// or during it is cancelled.
    pub async fn restore(&self) -> SyncResult<PullOutcome> {
        let _paused = PausedDetector::new(self);
        self.service.pull(self.session.identity()).await
    }

    /// Stops every scheduler and the detector. A push already on the wire
    /// finishes but its outcome is not reported.
    pub fn stop(&self) {
        let task = self
            .detector_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if task.is_none() {
            return;
        }
        self.debounce.cancel();
        self.interval.stop();
        self.detector.disable_session(&self.session);
        drop(task);
        debug!("Automatic sync stopped for {}", self.session.identity());
    }
}

/// Keeps the detector off a session until dropped, then rebaselines and
/// resumes it if the session is still running.
struct PausedDetector<'a> {
    auto: &'a AutoSync,
}

impl<'a> PausedDetector<'a> {
    fn new(auto: &'a AutoSync) -> Self {
        auto.debounce.cancel();
        auto.detector.disable_session(&auto.session);
        Self { auto }
    }
}

impl Drop for PausedDetector<'_> {
    fn drop(&mut self) {
        let auto = self.auto;
        auto.detector.rebaseline();
        let task = auto
            .detector_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() && auto.session.is_active() {
            auto.detector
                .enable(auto.session.clone(), auto.debounce.clone());
        }
        drop(task);
        auto.debounce.cancel();
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.stop();
    }
}
