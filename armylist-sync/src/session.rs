//! Sync session, the explicit per-sign-in context.
//!
//! Created when an identity signs in and closed when it signs out. Every
//! scheduler and the change detector hold the session and check
//! [`SyncSession::is_active`] before doing anything, so closing it is enough
//! to stop late timers from pushing on behalf of a departed user.

use armylist_types::Identity;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug)]
pub struct SyncSession {
    identity: Identity,
    enabled: AtomicBool,
    closed: AtomicBool,
}

impl SyncSession {
    /// Starts an enabled session for `identity`.
    pub fn new(identity: Identity) -> Arc<Self> {
        info!("Sync session started for {}", identity);
        Arc::new(Self {
            identity,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Ends the session. Irreversible.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Sync session closed for {}", self.identity);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enabled and not closed.
    pub fn is_active(&self) -> bool {
        self.is_enabled() && !self.is_closed()
    }
}
