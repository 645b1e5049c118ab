//! Local-to-remote sync engine.
//!
//! Keeps a signed-in user's army lists, custom detachments and custom units
//! mirrored to a remote document store:
//!
//! - [`SyncService`]: push/pull of the combined [`SyncedData`](armylist_types::SyncedData) document
//! - [`ChangeDetector`]: notices local writes (same context, other contexts, or by polling)
//! - [`DebounceScheduler`] / [`IntervalScheduler`]: decide when to push
//! - [`SyncController`]: starts and stops all of the above as identities come and go
//!
//! Remotes implement [`RemoteStore`]; in-memory, directory and HTTP
//! implementations are provided.

pub mod auto;
pub mod config;
pub mod controller;
pub mod detector;
pub mod error;
pub mod identity;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod status;

pub use auto::{AutoSync, AutoSyncParts};
pub use config::SyncConfig;
pub use controller::SyncController;
pub use detector::{ChangeDetector, DetectorTask};
pub use error::{SyncError, SyncResult};
pub use identity::{IdentityCell, IdentityProvider};
pub use remote::{
    FsRemoteConfig, FsRemoteStore, HttpRemoteConfig, HttpRemoteStore, MemoryRemoteStore,
    RemoteStore, WriteBatch, WriteOp,
};
pub use scheduler::{DebounceScheduler, IntervalScheduler, Pusher};
pub use service::{PullOutcome, SyncService};
pub use session::SyncSession;
pub use status::{StatusSnapshot, SyncObserver, SyncStatus};
