//! Authenticated identity source.

use armylist_types::Identity;
use tokio::sync::watch;
use tracing::info;

/// Supplies the currently signed-in identity and announces changes.
pub trait IdentityProvider: Send + Sync {
    /// Subscribes to identity changes. The receiver starts at the current
    /// value.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    fn current(&self) -> Option<Identity> {
        self.subscribe().borrow().clone()
    }
}

/// Identity holder driven by explicit sign-in/sign-out calls.
#[derive(Debug)]
pub struct IdentityCell {
    tx: watch::Sender<Option<Identity>>,
}

impl IdentityCell {
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!("Signed in as {}", identity);
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            info!("Signed out {}", previous);
        }
    }
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentityProvider for IdentityCell {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }

    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}
