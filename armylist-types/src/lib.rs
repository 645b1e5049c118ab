//! Core type definitions for army-list sync.
//!
//! This crate defines the plugin-agnostic types shared by the storage and
//! sync layers:
//! - Identity handles and record identifiers
//! - The fixed set of local record categories and their storage keys
//! - Remote document shapes (`SyncedData`, metadata documents)
//! - Monotonic ISO-8601 sync timestamps
//!
//! Record contents are opaque to the core; only the `{ id: record }`
//! envelope is understood here.

mod category;
mod document;
mod ids;
mod timestamp;

pub use category::{Category, ChangeTopic};
pub use document::{DocumentName, MetadataDocument, RecordMap, SyncedData};
pub use ids::{Identity, RecordId};
pub use timestamp::SyncTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
