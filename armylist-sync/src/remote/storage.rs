//! Remote store abstraction trait.
//!
//! Documents are addressed by identity and [`DocumentName`]; each identity
//! owns one collection. Writes go through [`WriteBatch`] so the primary
//! document and its metadata documents land together.

use crate::error::SyncResult;
use armylist_types::{DocumentName, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOp {
    /// Replace the whole document.
    Set { document: DocumentName, fields: Value },
    /// Delete the document. Deleting a missing document is not an error.
    Delete { document: DocumentName },
}

impl WriteOp {
    pub fn document(&self) -> DocumentName {
        match self {
            WriteOp::Set { document, .. } | WriteOp::Delete { document } => *document,
        }
    }
}

/// An ordered set of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteBatch {
    writes: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a full-document replace.
    pub fn set(&mut self, document: DocumentName, fields: Value) -> &mut Self {
        self.writes.push(WriteOp::Set { document, fields });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, document: DocumentName) -> &mut Self {
        self.writes.push(WriteOp::Delete { document });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[WriteOp] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<WriteOp> {
        self.writes
    }
}

/// Abstract remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of the remote provider.
    fn provider_name(&self) -> &'static str;

    /// Reads one document, `None` if it does not exist.
    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>>;

    /// Applies every write in `batch` atomically.
    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()>;
}
