//! Instrumented category stores.
//!
//! A [`CategoryStore`] owns the write path of one category. Each mutating
//! call writes through the raw [`KeyValueStore`] first and publishes the
//! category's [`ChangeTopic`] only once every write has succeeded. Reads
//! never publish.

use crate::emitter::ChangeEmitter;
use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;
use crate::record::{Record, RecordIndexEntry};
use armylist_types::{Category, ChangeTopic, RecordId, SyncTimestamp};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// CRUD over one category envelope, publishing change notifications.
#[derive(Clone)]
pub struct CategoryStore {
    topic: ChangeTopic,
    raw: Arc<dyn KeyValueStore>,
    emitter: ChangeEmitter,
}

impl CategoryStore {
    /// Creates a store for the category behind `topic`.
    pub fn new(topic: ChangeTopic, raw: Arc<dyn KeyValueStore>, emitter: ChangeEmitter) -> Self {
        Self {
            topic,
            raw,
            emitter,
        }
    }

    /// Custom units store.
    pub fn units(raw: Arc<dyn KeyValueStore>, emitter: ChangeEmitter) -> Self {
        Self::new(ChangeTopic::CustomUnitsChanged, raw, emitter)
    }

    /// Custom detachments store; also maintains the detachment index.
    pub fn detachments(raw: Arc<dyn KeyValueStore>, emitter: ChangeEmitter) -> Self {
        Self::new(ChangeTopic::CustomDetachmentsChanged, raw, emitter)
    }

    /// Army lists store; also maintains the army-list index.
    pub fn army_lists(raw: Arc<dyn KeyValueStore>, emitter: ChangeEmitter) -> Self {
        Self::new(ChangeTopic::ArmyListsChanged, raw, emitter)
    }

    pub fn category(&self) -> Category {
        self.topic.category()
    }

    pub fn topic(&self) -> ChangeTopic {
        self.topic
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Every record in the category.
    ///
    /// Unreadable or corrupt data is logged and reported as empty. Entries
    /// that are not JSON objects are skipped.
    pub fn get_all(&self) -> BTreeMap<RecordId, Record> {
        let entries = match self.load() {
            Ok(Loaded { entries, .. }) => entries,
            Err(e) => {
                warn!("Failed to read {}: {}", self.category(), e);
                return BTreeMap::new();
            }
        };
        entries
            .iter()
            .filter_map(|(key, value)| match Record::from_stored(key, value) {
                Some(record) => Some((RecordId::from(key.as_str()), record)),
                None => {
                    warn!("Skipping non-object entry {} in {}", key, self.category());
                    None
                }
            })
            .collect()
    }

    /// Looks up one record.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        let Loaded { entries, .. } = self.load().ok()?;
        Record::from_stored(id.as_str(), entries.get(id.as_str())?)
    }

    /// Generates an id not yet used in this category.
    pub fn generate_id(&self) -> RecordId {
        let existing = self.load().map(|l| l.entries).unwrap_or_default();
        loop {
            let id = RecordId::generate();
            if !existing.contains_key(id.as_str()) {
                return id;
            }
        }
    }

    /// Whether another record already uses `name` (trimmed, case-insensitive).
    /// `exclude` skips the record being renamed.
    pub fn is_name_taken(&self, name: &str, exclude: Option<&RecordId>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.get_all().iter().any(|(key, record)| {
            Some(key) != exclude && record.name.trim().to_lowercase() == wanted
        })
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts or replaces `record`. Other entries are kept verbatim.
    pub fn save(&self, record: Record) -> StorageResult<()> {
        let mut loaded = self.load_for_write()?;
        debug!("Saving {} {}", self.category(), record.id);
        let value = serde_json::to_value(&record)?;
        loaded.entries.insert(record.id.to_string(), value);
        self.store(&loaded)?;
        self.emitter.publish(self.topic);
        Ok(())
    }

    /// Inserts `record` after checking its name is unused.
    pub fn create(&self, record: Record) -> StorageResult<()> {
        if self.is_name_taken(&record.name, Some(&record.id)) {
            return Err(StorageError::NameTaken(record.name));
        }
        self.save(record)
    }

    /// Replaces an existing record, stamping a fresh `updatedAt`.
    pub fn update(&self, mut record: Record) -> StorageResult<Record> {
        let mut loaded = self.load_for_write()?;
        let previous = loaded
            .entries
            .get(record.id.as_str())
            .ok_or_else(|| StorageError::NotFound(record.id.to_string()))?;
        let stamp = match Record::from_stored(record.id.as_str(), previous)
            .and_then(|prev| prev.updated_at)
        {
            Some(prev) => prev.tick(),
            None => SyncTimestamp::now(),
        };
        record.updated_at = Some(stamp);
        record.body.remove("updatedAt");
        loaded
            .entries
            .insert(record.id.to_string(), serde_json::to_value(&record)?);
        self.store(&loaded)?;
        self.emitter.publish(self.topic);
        Ok(record)
    }

    /// Deletes a record. Returns `false` (and writes nothing) if it did not
    /// exist.
    pub fn delete(&self, id: &RecordId) -> StorageResult<bool> {
        let mut loaded = self.load_for_write()?;
        if loaded.entries.remove(id.as_str()).is_none() {
            return Ok(false);
        }
        debug!("Deleting {} {}", self.category(), id);
        self.store(&loaded)?;
        self.emitter.publish(self.topic);
        Ok(true)
    }

    // ── Internals ────────────────────────────────────────────────

    fn load(&self) -> StorageResult<Loaded> {
        let raw = self.raw.get(self.category().storage_key())?;
        let entries = match &raw {
            None => Map::new(),
            Some(text) => serde_json::from_str(text)?,
        };
        Ok(Loaded { raw, entries })
    }

    /// Raw-store failures abort the write; a category that is not a JSON
    /// object is replaced.
    fn load_for_write(&self) -> StorageResult<Loaded> {
        match self.load() {
            Ok(loaded) => Ok(loaded),
            Err(StorageError::Serialization(e)) => {
                warn!(
                    "Discarding unreadable {} before write: {}",
                    self.category(),
                    e
                );
                Ok(Loaded {
                    raw: self.raw.get(self.category().storage_key())?,
                    entries: Map::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the category then its index. If the index write fails the
    /// category key is put back as it was.
    fn store(&self, loaded: &Loaded) -> StorageResult<()> {
        let key = self.category().storage_key();
        self.raw.set(key, &serde_json::to_string(&loaded.entries)?)?;

        let Some(meta) = self.category().metadata() else {
            return Ok(());
        };
        let written = serde_json::to_string(&index_of(&loaded.entries))
            .map_err(StorageError::from)
            .and_then(|index| self.raw.set(meta.storage_key(), &index));
        if let Err(e) = written {
            let rollback = match &loaded.raw {
                Some(previous) => self.raw.set(key, previous),
                None => self.raw.remove(key),
            };
            if let Err(rollback_err) = rollback {
                warn!("Failed to roll back {}: {}", self.category(), rollback_err);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// A category as read from the raw store.
struct Loaded {
    raw: Option<String>,
    entries: Map<String, Value>,
}

fn index_of(entries: &Map<String, Value>) -> BTreeMap<&str, RecordIndexEntry> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            Record::from_stored(key, value)
                .map(|record| (key.as_str(), RecordIndexEntry::from(&record)))
        })
        .collect()
}
