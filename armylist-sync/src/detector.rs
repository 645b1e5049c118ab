//! Local change detection.
//!
//! Three independent producers feed one consumer:
//!
//! 1. Cross-context [`StorageEvent`]s for a watched key → [`ChangeDetector::check_for_changes`]
//! 2. Same-context [`ChangeEmitter`] topics → debounced trigger directly
//! 3. A fallback poll → [`ChangeDetector::check_for_changes`]
//!
//! `check_for_changes` compares the raw serialized text of every watched
//! category with the last-seen snapshot and fires the debounced trigger on
//! any difference. Snapshots are kept per identity across disable/enable,
//! so re-enabling only reports data that actually differs from what the
//! previous session last saw.

use crate::scheduler::DebounceScheduler;
use crate::session::SyncSession;
use armylist_storage::{ChangeEmitter, KeyValueStore, StorageEvent, StorageEvents, Subscription};
use armylist_types::{Category, ChangeTopic, Identity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

struct Active {
    session: Arc<SyncSession>,
    trigger: Arc<DebounceScheduler>,
}

#[derive(Default)]
struct DetectorState {
    active: Option<Active>,
    /// Identity the snapshots below belong to.
    identity: Option<Identity>,
    last_seen: HashMap<Category, Option<String>>,
}

pub struct ChangeDetector {
    local: Arc<dyn KeyValueStore>,
    watched: Vec<Category>,
    state: Mutex<DetectorState>,
}

impl ChangeDetector {
    pub fn new(local: Arc<dyn KeyValueStore>, watched: Vec<Category>) -> Self {
        Self {
            local,
            watched,
            state: Mutex::new(DetectorState::default()),
        }
    }

    pub fn watched(&self) -> &[Category] {
        &self.watched
    }

    /// Starts reporting changes for `session` through `trigger`.
    ///
    /// Snapshots are captured now unless they already belong to this
    /// session's identity.
    pub fn enable(&self, session: Arc<SyncSession>, trigger: Arc<DebounceScheduler>) {
        let mut state = self.lock();
        if state.identity.as_ref() != Some(session.identity()) {
            debug!("Capturing initial snapshots for {}", session.identity());
            state.last_seen = self.capture();
            state.identity = Some(session.identity().clone());
        }
        state.active = Some(Active { session, trigger });
    }

    /// Stops reporting. Snapshots are kept.
    pub fn disable(&self) {
        self.lock().active = None;
    }

    /// Disables only if `session` is the one currently enabled.
    pub fn disable_session(&self, session: &Arc<SyncSession>) {
        let mut state = self.lock();
        if state
            .active
            .as_ref()
            .is_some_and(|a| Arc::ptr_eq(&a.session, session))
        {
            state.active = None;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lock()
            .active
            .as_ref()
            .is_some_and(|a| a.session.is_active())
    }

    /// Re-captures every snapshot without triggering, e.g. after a restore
    /// overwrote local data.
    pub fn rebaseline(&self) {
        let snapshots = self.capture();
        self.lock().last_seen = snapshots;
    }

    /// Diffs every watched category against its snapshot. Returns whether a
    /// push was triggered.
    pub fn check_for_changes(&self) -> bool {
        let trigger = {
            let mut state = self.lock();
            let Some(trigger) = Self::active_trigger(&state) else {
                return false;
            };

            let mut changed = Vec::new();
            for &category in &self.watched {
                let current = match self.local.get(category.storage_key()) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("Failed to read {} while checking for changes: {}", category, e);
                        continue;
                    }
                };
                if state.last_seen.get(&category) != Some(&current) {
                    state.last_seen.insert(category, current);
                    changed.push(category);
                }
            }
            if changed.is_empty() {
                return false;
            }
            debug!("Detected local changes in {:?}", changed);
            trigger
        };
        trigger.trigger();
        true
    }

    /// Handles a write from another context.
    pub fn on_storage_event(&self, event: &StorageEvent) -> bool {
        match Category::from_storage_key(&event.key) {
            Some(category) if self.watched.contains(&category) => {
                trace!("Storage event for {} from {}", category, event.origin);
                self.check_for_changes()
            }
            _ => false,
        }
    }

    /// Handles a same-context change notification.
    ///
    /// The emitter only publishes confirmed writes, so this triggers without
    /// diffing; the affected snapshots are refreshed so the poll does not
    /// report the same write again.
    pub fn on_local_change(&self, topic: ChangeTopic) -> bool {
        let trigger = {
            let mut state = self.lock();
            let Some(trigger) = Self::active_trigger(&state) else {
                return false;
            };
            let category = topic.category();
            for c in std::iter::once(category).chain(category.metadata()) {
                if !self.watched.contains(&c) {
                    continue;
                }
                match self.local.get(c.storage_key()) {
                    Ok(current) => {
                        state.last_seen.insert(c, current);
                    }
                    Err(e) => warn!("Failed to refresh snapshot for {}: {}", c, e),
                }
            }
            trigger
        };
        trace!("Local change: {}", topic);
        trigger.trigger();
        true
    }

    /// Runs the three producers until the returned task is dropped.
    pub fn spawn(
        self: &Arc<Self>,
        mut events: StorageEvents,
        emitter: &ChangeEmitter,
        poll_interval: Duration,
    ) -> DetectorTask {
        let (tx, mut local_changes) = mpsc::unbounded_channel();
        let subscriptions: Vec<Subscription> = ChangeTopic::ALL
            .into_iter()
            .filter(|topic| self.watched.contains(&topic.category()))
            .map(|topic| {
                let tx = tx.clone();
                emitter.subscribe_guarded(topic, move || {
                    let _ = tx.send(topic);
                })
            })
            .collect();
        drop(tx);

        let detector = self.clone();
        let task = tokio::spawn(async move {
            let mut poll = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;

            loop {
                tokio::select! {
                    event = events.recv(), if events_open => match event {
                        Some(event) => {
                            detector.on_storage_event(&event);
                        }
                        None => {
                            debug!("Storage events closed, relying on poll");
                            events_open = false;
                        }
                    },
                    Some(topic) = local_changes.recv() => {
                        detector.on_local_change(topic);
                    }
                    _ = poll.tick() => {
                        detector.check_for_changes();
                    }
                }
            }
        });

        DetectorTask {
            task,
            _subscriptions: subscriptions,
        }
    }

    fn active_trigger(state: &DetectorState) -> Option<Arc<DebounceScheduler>> {
        state
            .active
            .as_ref()
            .filter(|a| a.session.is_active())
            .map(|a| a.trigger.clone())
    }

    fn capture(&self) -> HashMap<Category, Option<String>> {
        let mut snapshots = HashMap::new();
        for &category in &self.watched {
            match self.local.get(category.storage_key()) {
                Ok(value) => {
                    snapshots.insert(category, value);
                }
                Err(e) => warn!("Failed to snapshot {}: {}", category, e),
            }
        }
        snapshots
    }

    fn lock(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Running detector loop. Dropping it stops the loop and unsubscribes from
/// the emitter.
pub struct DetectorTask {
    task: JoinHandle<()>,
    _subscriptions: Vec<Subscription>,
}

impl DetectorTask {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for DetectorTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}
