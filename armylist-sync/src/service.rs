//! Sync service: the remote-facing facade.
//!
//! Serializes the local categories into one [`SyncedData`] document plus the
//! two metadata documents, and restores them on another device.
//!
//! Pushes and pulls for the same identity are single-flight: each identity
//! has a gate (an async mutex) and a concurrent request waits for the one in
//! flight to finish before it starts. The gate also remembers the last
//! `lastSynced` issued, which keeps the stamp non-decreasing even if the wall
//! clock steps back.
//!
//! A pull is a full overwrite of local data. Local edits made since the last
//! push, or during the pull's round-trip, are lost.

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteStore, WriteBatch};
use armylist_storage::KeyValueStore;
use armylist_types::{
    Category, DocumentName, Identity, MetadataDocument, RecordMap, SyncTimestamp, SyncedData,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// What a pull did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// No primary document exists; local storage was left untouched.
    NoRemoteData,
    /// Local categories were overwritten from the remote.
    Restored {
        last_synced: SyncTimestamp,
        /// Metadata documents that existed and were restored.
        metadata: Vec<DocumentName>,
    },
}

type Gate = Arc<tokio::sync::Mutex<Option<SyncTimestamp>>>;

pub struct SyncService {
    local: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteStore>,
    gates: Mutex<HashMap<Identity, Gate>>,
}

impl SyncService {
    pub fn new(local: Arc<dyn KeyValueStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn local(&self) -> &Arc<dyn KeyValueStore> {
        &self.local
    }

    fn gate(&self, identity: &Identity) -> Gate {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(identity.clone())
            .or_default()
            .clone()
    }

    /// Whether a push or pull is currently running for `identity`.
    pub fn is_busy(&self, identity: &Identity) -> bool {
        self.gate(identity).try_lock().is_err()
    }

    // ── Push ─────────────────────────────────────────────────────

    /// Uploads every local category as one batched write.
    ///
    /// Missing local keys upload as empty mappings. Any read, parse or
    /// remote failure aborts the push; nothing is recorded and the next
    /// trigger retries.
    pub async fn push(&self, identity: &Identity) -> SyncResult<SyncTimestamp> {
        let gate = self.gate(identity);
        let mut last_issued = gate.lock().await;

        let stamp = match *last_issued {
            Some(prev) => prev.tick(),
            None => SyncTimestamp::now(),
        };

        let mut data = SyncedData::empty(stamp);
        for category in SyncedData::CATEGORIES {
            if let Some(records) = data.records_mut(category) {
                *records = self.read_records(category)?;
            }
        }

        let mut batch = WriteBatch::new();
        batch.set(DocumentName::SyncData, serde_json::to_value(&data)?);
        for document in DocumentName::METADATA {
            if let Some(category) = document.metadata_category() {
                let meta = MetadataDocument::new(Value::Object(self.read_records(category)?));
                batch.set(document, serde_json::to_value(&meta)?);
            }
        }

        debug!(
            "Pushing {} lists, {} detachments, {} units for {}",
            data.army_lists.len(),
            data.custom_detachments.len(),
            data.custom_units.len(),
            identity
        );
        self.remote.commit(identity, batch).await?;

        *last_issued = Some(stamp);
        info!("Pushed local data for {} at {}", identity, stamp);
        Ok(stamp)
    }

    // ── Pull ─────────────────────────────────────────────────────

    /// Restores remote data into local storage, overwriting it.
    ///
    /// A missing primary document is a no-op. Metadata documents are
    /// restored independently, each only if present.
    pub async fn pull(&self, identity: &Identity) -> SyncResult<PullOutcome> {
        let gate = self.gate(identity);
        let mut last_issued = gate.lock().await;

        let Some(doc) = self
            .remote
            .get_document(identity, DocumentName::SyncData)
            .await?
        else {
            info!("No remote data for {}, nothing to restore", identity);
            return Ok(PullOutcome::NoRemoteData);
        };
        let data: SyncedData = serde_json::from_value(doc)?;

        for category in SyncedData::CATEGORIES {
            if let Some(records) = data.records(category) {
                self.write_category(category, &Value::Object(records.clone()))?;
            }
        }

        let mut metadata = Vec::new();
        for document in DocumentName::METADATA {
            let Some(category) = document.metadata_category() else {
                continue;
            };
            if let Some(doc) = self.remote.get_document(identity, document).await? {
                let meta: MetadataDocument = serde_json::from_value(doc)?;
                self.write_category(category, &meta.data)?;
                metadata.push(document);
            }
        }

        *last_issued = (*last_issued).max(Some(data.last_synced));
        info!(
            "Restored remote data for {} (last synced {})",
            identity, data.last_synced
        );
        Ok(PullOutcome::Restored {
            last_synced: data.last_synced,
            metadata,
        })
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Whether the primary document exists.
    pub async fn has_remote_data(&self, identity: &Identity) -> SyncResult<bool> {
        Ok(self
            .remote
            .get_document(identity, DocumentName::SyncData)
            .await?
            .is_some())
    }

    /// `lastSynced` of the primary document, `None` if there is none.
    pub async fn last_synced_at(&self, identity: &Identity) -> SyncResult<Option<SyncTimestamp>> {
        let Some(doc) = self
            .remote
            .get_document(identity, DocumentName::SyncData)
            .await?
        else {
            return Ok(None);
        };
        let last_synced = doc
            .get("lastSynced")
            .cloned()
            .map(serde_json::from_value::<SyncTimestamp>)
            .transpose()?;
        Ok(last_synced)
    }

    /// Deletes the primary and both metadata documents.
    pub async fn clear(&self, identity: &Identity) -> SyncResult<()> {
        let gate = self.gate(identity);
        let _guard = gate.lock().await;

        let mut batch = WriteBatch::new();
        for document in DocumentName::ALL {
            batch.delete(document);
        }
        self.remote.commit(identity, batch).await?;
        warn!("Cleared remote data for {}", identity);
        Ok(())
    }

    // ── Local access ─────────────────────────────────────────────

    fn read_records(&self, category: Category) -> SyncResult<RecordMap> {
        let key = category.storage_key();
        let Some(raw) = self.local.get(key)? else {
            return Ok(RecordMap::new());
        };
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(RecordMap::new()),
            other => Err(SyncError::Storage(format!(
                "{key} holds {} instead of an object",
                json_kind(&other)
            ))),
        }
    }

    fn write_category(&self, category: Category, value: &Value) -> SyncResult<()> {
        let json = serde_json::to_string(value)?;
        self.local.set(category.storage_key(), &json)?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
