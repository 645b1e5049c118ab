//! Local storage layer for army-list sync.
//!
//! Provides the on-device side of synchronization:
//! - [`KeyValueStore`]: the raw synchronous get/set/remove contract
//! - [`SharedStorage`] / [`StorageContext`]: storage shared by several
//!   browsing contexts, with a cross-context [`StorageEvent`] broadcast and
//!   optional JSON-file persistence
//! - [`ChangeEmitter`]: in-process publish/subscribe of change topics
//! - [`CategoryStore`]: instrumented CRUD over one category that publishes
//!   its change topic after every successful write
//!
//! # Architecture
//!
//! Every category lives under one storage key as a JSON object mapping
//! record id to record. `CategoryStore` is the only sanctioned writer of
//! those keys; writes that bypass it are still picked up by the sync
//! layer's snapshot poll, only later.

mod emitter;
mod error;
mod kv;
mod record;
mod shared;
mod store;

pub use emitter::{ChangeEmitter, ListenerId, Subscription};
pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, MemoryStore};
pub use record::{Record, RecordIndexEntry};
pub use shared::{ContextId, SharedStorage, StorageContext, StorageEvent, StorageEvents};
pub use store::CategoryStore;
