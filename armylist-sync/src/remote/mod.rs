//! Remote document stores.
//!
//! The sync service talks to one [`RemoteStore`]; implementations provided
//! here keep documents in memory, in a directory tree, or behind an HTTP
//! document API.

pub mod fs;
pub mod http;
pub mod memory;
pub mod storage;

pub use fs::{FsRemoteConfig, FsRemoteStore};
pub use http::{HttpRemoteConfig, HttpRemoteStore};
pub use memory::MemoryRemoteStore;
pub use storage::{RemoteStore, WriteBatch, WriteOp};
