//! Sync controller: owns the session lifecycle.
//!
//! Automatic sync runs exactly while an identity is signed in *and* sync is
//! enabled. Every change to either input reconciles: the old session (if
//! any) is closed and torn down before a new one starts, so no timer left
//! over from a previous user can push on their behalf.

use crate::auto::{AutoSync, AutoSyncParts};
use crate::config::SyncConfig;
use crate::detector::ChangeDetector;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::service::{PullOutcome, SyncService};
use crate::session::SyncSession;
use crate::status::{StatusSnapshot, SyncObserver};
use armylist_storage::{ChangeEmitter, KeyValueStore, StorageContext};
use armylist_types::{Identity, SyncTimestamp};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct ControllerState {
    identity: Option<Identity>,
    enabled: bool,
    auto: Option<Arc<AutoSync>>,
}

pub struct SyncController {
    service: Arc<SyncService>,
    context: StorageContext,
    emitter: ChangeEmitter,
    detector: Arc<ChangeDetector>,
    config: SyncConfig,
    observer: Option<Arc<dyn SyncObserver>>,
    state: Mutex<ControllerState>,
}

impl SyncController {
    /// Creates a controller for one storage context. Sync starts enabled but
    /// idle until an identity is set.
    pub fn new(
        context: StorageContext,
        emitter: ChangeEmitter,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> Self {
        let local: Arc<dyn KeyValueStore> = Arc::new(context.clone());
        let service = Arc::new(SyncService::new(local.clone(), remote));
        let detector = Arc::new(ChangeDetector::new(
            local,
            config.watched_categories.clone(),
        ));
        Self {
            service,
            context,
            emitter,
            detector,
            config,
            observer: None,
            state: Mutex::new(ControllerState {
                identity: None,
                enabled: true,
                auto: None,
            }),
        }
    }

    /// Forwards push lifecycle events of every future session to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// The running session, if automatic sync is active.
    pub fn session(&self) -> Option<Arc<SyncSession>> {
        self.lock().auto.as_ref().map(|auto| auto.session().clone())
    }

    /// Status of the running session.
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.lock().auto.as_ref().map(|auto| auto.status())
    }

    // ── Lifecycle inputs ─────────────────────────────────────────

    /// Sets (or clears, on sign-out) the signed-in identity.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let mut state = self.lock();
        if state.identity == identity {
            return;
        }
        match &identity {
            Some(id) => debug!("Identity changed to {}", id),
            None => debug!("Identity cleared"),
        }
        state.identity = identity;
        self.reconcile(&mut state);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        if state.enabled == enabled {
            return;
        }
        info!(
            "Automatic sync {}",
            if enabled { "enabled" } else { "disabled" }
        );
        state.enabled = enabled;
        self.reconcile(&mut state);
    }

    /// Follows an identity source until it closes, which counts as sign-out.
    pub fn watch_identity(
        self: &Arc<Self>,
        mut identities: watch::Receiver<Option<Identity>>,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.set_identity(identities.borrow_and_update().clone());
            while identities.changed().await.is_ok() {
                controller.set_identity(identities.borrow_and_update().clone());
            }
            debug!("Identity source closed");
            controller.set_identity(None);
        })
    }

    /// Stops automatic sync without forgetting the identity.
    pub fn shutdown(&self) {
        let auto = self.lock().auto.take();
        if let Some(auto) = auto {
            Self::teardown(&auto);
        }
    }

    fn reconcile(&self, state: &mut MutexGuard<'_, ControllerState>) {
        let wanted = state.identity.clone().filter(|_| state.enabled);
        let running = state
            .auto
            .as_ref()
            .map(|auto| auto.session().identity().clone());
        if wanted == running {
            return;
        }

        if let Some(auto) = state.auto.take() {
            Self::teardown(&auto);
        }
        if let Some(identity) = wanted {
            let session = SyncSession::new(identity);
            let auto = AutoSync::start(
                session,
                AutoSyncParts {
                    service: self.service.clone(),
                    detector: self.detector.clone(),
                    events: self.context.events(),
                    emitter: &self.emitter,
                    config: &self.config,
                    observer: self.observer.clone(),
                },
            );
            state.auto = Some(Arc::new(auto));
        }
    }

    fn teardown(auto: &AutoSync) {
        auto.session().close();
        auto.stop();
    }

    // ── Manual operations ────────────────────────────────────────

    /// Pushes now on behalf of the running session.
    pub async fn sync_now(&self) -> SyncResult<SyncTimestamp> {
        let auto = {
            let state = self.lock();
            if state.identity.is_none() {
                return Err(SyncError::NotSignedIn);
            }
            state.auto.clone().ok_or(SyncError::SessionClosed)?
        };
        auto.sync_now().await
    }

    /// Replaces local data with the remote copy. Works while sync is
    /// disabled, as long as someone is signed in.
    pub async fn restore(&self) -> SyncResult<PullOutcome> {
        let (identity, auto) = self.signed_in()?;
        match auto {
            Some(auto) => auto.restore().await,
            None => {
                let outcome = self.service.pull(&identity).await?;
                self.detector.rebaseline();
                Ok(outcome)
            }
        }
    }

    pub async fn has_remote_data(&self) -> SyncResult<bool> {
        let (identity, _) = self.signed_in()?;
        self.service.has_remote_data(&identity).await
    }

    pub async fn last_synced_at(&self) -> SyncResult<Option<SyncTimestamp>> {
        let (identity, _) = self.signed_in()?;
        self.service.last_synced_at(&identity).await
    }

    /// Deletes every remote document of the signed-in identity.
    pub async fn clear_remote(&self) -> SyncResult<()> {
        let (identity, _) = self.signed_in()?;
        self.service.clear(&identity).await
    }

    fn signed_in(&self) -> SyncResult<(Identity, Option<Arc<AutoSync>>)> {
        let state = self.lock();
        let identity = state.identity.clone().ok_or(SyncError::NotSignedIn)?;
        Ok((identity, state.auto.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
