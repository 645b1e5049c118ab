#![allow(dead_code)]

use armylist_storage::{KeyValueStore, MemoryStore};
use armylist_sync::{
    MemoryRemoteStore, RemoteStore, SyncError, SyncObserver, SyncResult, SyncService, WriteBatch,
};
use armylist_types::{DocumentName, Identity, SyncTimestamp};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn identity(uid: &str) -> Identity {
    Identity::new(uid).unwrap()
}

/// A device: its own local storage on top of a shared remote.
pub fn device(remote: Arc<dyn RemoteStore>) -> (Arc<MemoryStore>, Arc<SyncService>) {
    let local = Arc::new(MemoryStore::new());
    let service = Arc::new(SyncService::new(local.clone(), remote));
    (local, service)
}

pub fn read_json(local: &dyn KeyValueStore, key: &str) -> Option<Value> {
    local
        .get(key)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Lets spawned tasks run to their next await point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ── Observers ────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingObserver {
    pub starts: AtomicUsize,
    pub successes: AtomicUsize,
    pub failures: AtomicUsize,
}

impl CountingObserver {
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl SyncObserver for CountingObserver {
    fn on_sync_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sync_success(&self, _last_synced: SyncTimestamp) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sync_failure(&self, _error: &SyncError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Remotes ──────────────────────────────────────────────────────

/// Memory remote whose commits can be switched to fail.
#[derive(Default)]
pub struct FlakyRemote {
    pub inner: MemoryRemoteStore,
    pub fail: AtomicBool,
    pub attempts: AtomicUsize,
}

impl FlakyRemote {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    fn provider_name(&self) -> &'static str {
        "Flaky"
    }

    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>> {
        self.inner.get_document(identity, document).await
    }

    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Network("connection reset".into()));
        }
        self.inner.commit(identity, batch).await
    }
}

/// Memory remote that takes `delay` per commit (and `read_delay` per
/// document read) and tracks commit overlap.
pub struct SlowRemote {
    pub inner: MemoryRemoteStore,
    pub delay: Duration,
    pub read_delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SlowRemote {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryRemoteStore::new(),
            delay,
            read_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_read_delay(mut self, read_delay: Duration) -> Self {
        self.read_delay = read_delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for SlowRemote {
    fn provider_name(&self) -> &'static str {
        "Slow"
    }

    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>> {
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        self.inner.get_document(identity, document).await
    }

    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.commit(identity, batch).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
