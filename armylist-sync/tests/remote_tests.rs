mod common;

use armylist_sync::{FsRemoteConfig, FsRemoteStore, MemoryRemoteStore, RemoteStore, WriteBatch};
use armylist_types::DocumentName;
use common::identity;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn full_batch() -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch
        .set(
            DocumentName::SyncData,
            json!({"armyLists": {}, "customDetachments": {}, "customUnits": {}, "lastSynced": "2024-05-01T12:30:00.000Z"}),
        )
        .set(DocumentName::ArmyListsMetadata, json!({"data": {}}))
        .set(DocumentName::CustomDetachmentsMetadata, json!({"data": {}}));
    batch
}

// ── Memory ───────────────────────────────────────────────────────

#[tokio::test]
async fn memory_missing_document_is_none() {
    let remote = MemoryRemoteStore::new();
    let doc = remote
        .get_document(&identity("alice"), DocumentName::SyncData)
        .await
        .unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn memory_commit_applies_sets_and_deletes_in_order() {
    let remote = MemoryRemoteStore::new();
    let uid = identity("alice");
    remote.commit(&uid, full_batch()).await.unwrap();
    assert_eq!(remote.document_count(&uid).await, 3);

    let mut batch = WriteBatch::new();
    batch
        .delete(DocumentName::ArmyListsMetadata)
        .set(DocumentName::ArmyListsMetadata, json!({"data": {"l1": {}}}))
        .delete(DocumentName::CustomDetachmentsMetadata);
    remote.commit(&uid, batch).await.unwrap();

    assert_eq!(
        remote
            .get_document(&uid, DocumentName::ArmyListsMetadata)
            .await
            .unwrap(),
        Some(json!({"data": {"l1": {}}}))
    );
    assert_eq!(remote.document_count(&uid).await, 2);
    assert_eq!(remote.commit_count(), 2);
}

#[tokio::test]
async fn memory_delete_of_missing_document_is_ok() {
    let remote = MemoryRemoteStore::new();
    let mut batch = WriteBatch::new();
    batch.delete(DocumentName::SyncData);
    remote.commit(&identity("alice"), batch).await.unwrap();
    assert_eq!(remote.document_count(&identity("alice")).await, 0);
}

// ── Directory ────────────────────────────────────────────────────

fn fs_remote(dir: &TempDir) -> FsRemoteStore {
    FsRemoteStore::new(FsRemoteConfig {
        root: dir.path().to_path_buf(),
    })
}

#[tokio::test]
async fn fs_commit_writes_one_file_per_document() {
    let dir = TempDir::new().unwrap();
    let remote = fs_remote(&dir);
    let uid = identity("alice");

    remote.commit(&uid, full_batch()).await.unwrap();

    let sync_dir = dir.path().join("users").join("alice").join("sync");
    for name in ["data", "armyListsMetadata", "customDetachmentsMetadata"] {
        assert!(sync_dir.join(format!("{name}.json")).is_file(), "{name}");
    }
    let leftovers: Vec<_> = std::fs::read_dir(&sync_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn fs_documents_are_visible_to_another_store_on_the_same_root() {
    let dir = TempDir::new().unwrap();
    let uid = identity("alice");
    fs_remote(&dir).commit(&uid, full_batch()).await.unwrap();

    let other = fs_remote(&dir);
    let doc = other
        .get_document(&uid, DocumentName::SyncData)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(doc["lastSynced"], "2024-05-01T12:30:00.000Z");
    assert!(
        other
            .get_document(&identity("bob"), DocumentName::SyncData)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn fs_delete_removes_documents_and_tolerates_missing_ones() {
    let dir = TempDir::new().unwrap();
    let remote = fs_remote(&dir);
    let uid = identity("alice");
    remote.commit(&uid, full_batch()).await.unwrap();

    let mut batch = WriteBatch::new();
    for document in DocumentName::ALL {
        batch.delete(document);
    }
    remote.commit(&uid, batch.clone()).await.unwrap();
    remote.commit(&uid, batch).await.unwrap();

    for document in DocumentName::ALL {
        assert!(remote.get_document(&uid, document).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn fs_corrupt_document_is_an_error() {
    let dir = TempDir::new().unwrap();
    let remote = fs_remote(&dir);
    let uid = identity("alice");
    let sync_dir = dir.path().join("users").join("alice").join("sync");
    std::fs::create_dir_all(&sync_dir).unwrap();
    std::fs::write(sync_dir.join("data.json"), "{truncated").unwrap();

    assert!(remote.get_document(&uid, DocumentName::SyncData).await.is_err());
}

#[tokio::test]
async fn fs_failed_publish_keeps_previous_data_and_removes_staged_files() {
    let dir = TempDir::new().unwrap();
    let remote = fs_remote(&dir);
    let uid = identity("alice");
    let sync_dir = dir.path().join("users").join("alice").join("sync");
    // A non-empty directory where a metadata document should go makes its
    // rename fail.
    let blocked = sync_dir.join("customDetachmentsMetadata.json");
    std::fs::create_dir_all(&blocked).unwrap();
    std::fs::write(blocked.join("keep"), "x").unwrap();

    assert!(remote.commit(&uid, full_batch()).await.is_err());

    assert!(
        remote
            .get_document(&uid, DocumentName::SyncData)
            .await
            .unwrap()
            .is_none()
    );
    let leftovers: Vec<_> = std::fs::read_dir(&sync_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
