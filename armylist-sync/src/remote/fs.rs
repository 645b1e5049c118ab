//! Directory-backed remote store.
//!
//! Lays documents out as `<root>/users/<identity>/sync/<document>.json`.
//! Works against any mounted folder that another device also sees (a
//! network share, a cloud-drive folder).
//!
//! A batch is staged as hidden `.tmp` files first and only then renamed into
//! place, so a failure while staging leaves the previous documents intact.
//! Publishing is not atomic: documents are renamed one at a time with the
//! primary `data` document last, so a failure partway leaves the previous
//! `data` in place next to some updated metadata documents.

use super::storage::{RemoteStore, WriteBatch, WriteOp};
use crate::error::{SyncError, SyncResult};
use armylist_types::{DocumentName, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Directory remote configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsRemoteConfig {
    /// Root folder holding the `users/` tree.
    pub root: PathBuf,
}

impl Default for FsRemoteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("armylist-remote"),
        }
    }
}

pub struct FsRemoteStore {
    config: FsRemoteConfig,
    /// Serializes commits from this process.
    commit_lock: Mutex<()>,
}

impl FsRemoteStore {
    pub fn new(config: FsRemoteConfig) -> Self {
        Self {
            config,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn collection_dir(&self, identity: &Identity) -> PathBuf {
        self.config
            .root
            .join("users")
            .join(identity.as_str())
            .join("sync")
    }

    fn document_path(&self, identity: &Identity, document: DocumentName) -> PathBuf {
        self.collection_dir(identity)
            .join(format!("{}.json", document.as_str()))
    }

    fn staging_path(&self, identity: &Identity, document: DocumentName) -> PathBuf {
        self.collection_dir(identity)
            .join(format!(".{}.json.tmp", document.as_str()))
    }

    async fn cleanup_staged(&self, staged: &[(DocumentName, PathBuf, PathBuf)]) {
        for (_, tmp, _) in staged {
            if let Err(e) = fs::remove_file(tmp).await {
                warn!("Failed to remove staged file {:?}: {}", tmp, e);
            }
        }
    }
}

#[async_trait]
impl RemoteStore for FsRemoteStore {
    fn provider_name(&self) -> &'static str {
        "Directory"
    }

    async fn get_document(
        &self,
        identity: &Identity,
        document: DocumentName,
    ) -> SyncResult<Option<Value>> {
        let path = self.document_path(identity, document);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read remote document {:?}", path);
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn commit(&self, identity: &Identity, batch: WriteBatch) -> SyncResult<()> {
        let _guard = self.commit_lock.lock().await;
        let dir = self.collection_dir(identity);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SyncError::Storage(format!("failed to create {}: {e}", dir.display())))?;

        // Stage every set before touching live documents.
        let mut staged = Vec::new();
        let mut deletes = Vec::new();
        for write in batch.writes() {
            match write {
                WriteOp::Set { document, fields } => {
                    let tmp = self.staging_path(identity, *document);
                    let bytes = serde_json::to_vec_pretty(fields)?;
                    if let Err(e) = fs::write(&tmp, bytes).await {
                        self.cleanup_staged(&staged).await;
                        return Err(SyncError::Storage(format!(
                            "failed to stage {}: {e}",
                            tmp.display()
                        )));
                    }
                    staged.push((*document, tmp, self.document_path(identity, *document)));
                }
                WriteOp::Delete { document } => {
                    deletes.push(self.document_path(identity, *document));
                }
            }
        }

        staged.sort_by_key(|(document, _, _)| *document == DocumentName::SyncData);
        for (i, (_, tmp, live)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp, live).await {
                self.cleanup_staged(&staged[i..]).await;
                return Err(SyncError::Storage(format!(
                    "failed to publish {}: {e}",
                    live.display()
                )));
            }
        }
        for path in deletes {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Deleted remote document {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SyncError::Storage(format!(
                        "failed to delete {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        info!(
            "Committed {} writes for {} to {:?}",
            batch.len(),
            identity,
            dir
        );
        Ok(())
    }
}
