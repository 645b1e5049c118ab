//! In-memory remote store.
//!
//! Backs tests and offline sessions. Batches are applied under one write
//! lock, so readers never observe half of a commit.

use super::storage::{RemoteStore, WriteBatch, WriteOp};
use crate::error::SyncResult;
use armylist_types::{DocumentName, Identity};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<HashMap<Identity, HashMap<DocumentName, Value>>>,
    commits: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed batches since creation.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of documents stored for `identity`.
    pub async fn document_count(&self, identity: &Identity) -> usize {
        self.collections
            .read()
            .await
            .get(identity)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(identity)
            .and_then(|docs| docs.get(&document))
            .cloned())
    }

    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(identity.clone()).or_default();
        for write in batch.into_writes() {
            match write {
                WriteOp::Set { document, fields } => {
                    docs.insert(document, fields);
                }
                WriteOp::Delete { document } => {
                    docs.remove(&document);
                }
            }
        }
        if docs.is_empty() {
            collections.remove(identity);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        debug!("Committed batch for {}", identity);
        Ok(())
    }
}
