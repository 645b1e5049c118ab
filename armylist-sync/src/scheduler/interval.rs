//! Fixed-cadence push loop.

use super::Pusher;
use crate::error::SyncResult;
use armylist_types::SyncTimestamp;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Pushes immediately on start, then every `cadence` until stopped.
///
/// A failed push is not retried early; the next tick is the retry.
pub struct IntervalScheduler {
    pusher: Pusher,
    cadence: Duration,
    running: Mutex<Option<Running>>,
}

impl IntervalScheduler {
    pub fn new(pusher: Pusher, cadence: Duration) -> Self {
        Self {
            pusher,
            cadence,
            running: Mutex::new(None),
        }
    }

    /// Starts the loop. No-op if already running or the session is
    /// inactive. Must be called within a tokio runtime.
    pub fn start(&self) {
        if !self.pusher.session().is_active() {
            return;
        }
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let pusher = self.pusher.clone();
        let cadence = self.cadence;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        if !pusher.session().is_active() {
                            break;
                        }
                        // A stop request during the push is honored after
                        // it completes.
                        let _ = pusher.run().await;
                    }
                }
            }
            debug!("Interval push loop exited");
        });

        info!(
            "Interval sync started for {} every {:?}",
            self.pusher.session().identity(),
            cadence
        );
        *running = Some(Running { stop, task });
    }

    /// Stops the loop after any in-flight push.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            let _ = running.stop.send(true);
            debug!("Interval sync stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Pushes now, outside the cadence.
    pub async fn sync_now(&self) -> SyncResult<SyncTimestamp> {
        self.pusher.run().await
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
