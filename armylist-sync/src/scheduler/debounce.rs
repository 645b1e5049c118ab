//! Debounced push trigger.

use super::Pusher;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Collapses bursts of triggers into one push after a quiet period.
///
/// The timer task only sleeps; when it fires it hands the push to a
/// detached task, so cancelling a timer never interrupts a push already on
/// the wire.
pub struct DebounceScheduler {
    pusher: Pusher,
    quiet_period: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceScheduler {
    pub fn new(pusher: Pusher, quiet_period: Duration) -> Self {
        Self {
            pusher,
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    /// Restarts the quiet-period timer. Must be called within a tokio
    /// runtime.
    pub fn trigger(&self) {
        if !self.pusher.session().is_active() {
            trace!("Ignoring trigger for inactive session");
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = pending.take() {
            timer.abort();
        }

        let pusher = self.pusher.clone();
        let quiet_period = self.quiet_period;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            debug!("Quiet period elapsed, pushing");
            tokio::spawn(async move {
                // Outcome already reported through the observer.
                let _ = pusher.run().await;
            });
        }));
    }

    /// Cancels a pending timer. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let timer = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match timer {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                debug!("Cancelled pending debounced push");
                true
            }
            _ => false,
        }
    }

    /// Whether a timer is counting down.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
