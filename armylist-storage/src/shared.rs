//! Local storage shared between browsing contexts.
//!
//! A [`SharedStorage`] is the single backing map; each tab/window gets its
//! own [`StorageContext`] handle. A write through one context is broadcast
//! as a [`StorageEvent`] to every *other* context, mirroring the platform
//! `storage` event. Same-context writes produce no event, which is why the
//! sync layer also listens on the [`ChangeEmitter`](crate::ChangeEmitter).

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Identifies one browsing context attached to a [`SharedStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// "A shared storage key changed", delivered to every context except the
/// writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,
    /// The context that performed the write.
    pub origin: ContextId,
}

struct Inner {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageEvent>,
    next_context: AtomicU64,
}

/// Backing store shared by all contexts.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Inner>,
}

impl SharedStorage {
    /// Creates an empty, memory-only storage.
    pub fn in_memory() -> Self {
        Self::from_parts(BTreeMap::new(), None)
    }

    /// Opens a file-backed storage, loading existing contents if the file
    /// exists. Every mutation is written through to `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        info!("Opened local storage at {:?} ({} keys)", path, entries.len());
        Ok(Self::from_parts(entries, Some(path)))
    }

    fn from_parts(entries: BTreeMap<String, String>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(entries),
                path,
                events,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// Attaches a new browsing context.
    pub fn context(&self) -> StorageContext {
        let id = ContextId(self.inner.next_context.fetch_add(1, Ordering::Relaxed));
        debug!("Attached storage context {}", id);
        StorageContext {
            id,
            inner: self.inner.clone(),
        }
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// The file this storage persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }
}

impl Default for SharedStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Inner {
    /// Applies `value` (`None` removes) and writes through to disk.
    /// Returns whether the stored value actually changed.
    fn write(&self, key: &str, value: Option<&str>) -> StorageResult<bool> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };
        if previous.as_deref() == value {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &entries) {
                // Keep memory and disk in step.
                match previous {
                    Some(p) => entries.insert(key.to_string(), p),
                    None => entries.remove(key),
                };
                return Err(e);
            }
        }
        Ok(true)
    }
}

fn persist(path: &Path, entries: &BTreeMap<String, String>) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        warn!("Failed to replace {:?}: {}", path, e);
        StorageError::Io(e)
    })
}

/// One browsing context's handle on a [`SharedStorage`].
#[derive(Clone)]
pub struct StorageContext {
    id: ContextId,
    inner: Arc<Inner>,
}

impl StorageContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Subscribes to writes made by other contexts.
    ///
    /// Only writes made after this call are delivered.
    pub fn events(&self) -> StorageEvents {
        StorageEvents {
            rx: self.inner.events.subscribe(),
            own: self.id,
        }
    }

    fn notify(&self, key: &str) {
        // No receivers is fine: nobody else is watching.
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            origin: self.id,
        });
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("id", &self.id)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl KeyValueStore for StorageContext {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.inner.write(key, Some(value))? {
            self.notify(key);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        if self.inner.write(key, None)? {
            self.notify(key);
        }
        Ok(())
    }
}

/// Stream of [`StorageEvent`]s originating from other contexts.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    own: ContextId,
}

impl StorageEvents {
    /// Waits for the next foreign write. Returns `None` once the storage has
    /// been dropped.
    ///
    /// If this receiver fell behind, the missed events are skipped with a
    /// warning; the snapshot poll covers whatever they announced.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Storage event receiver lagged, skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.own => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!("Storage event receiver lagged, skipped {} events", missed);
                }
                Err(_) => return None,
            }
        }
    }
}
