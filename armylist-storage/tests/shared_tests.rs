use armylist_storage::{KeyValueStore, MemoryStore, SharedStorage};
use tempfile::TempDir;

// ── MemoryStore ──────────────────────────────────────────────────

#[test]
fn memory_store_get_set_remove() {
    let store = MemoryStore::new();
    assert!(store.is_empty());
    assert_eq!(store.get("k").unwrap(), None);

    store.set("k", "v").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    assert_eq!(store.len(), 1);

    store.remove("k").unwrap();
    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
}

// ── Cross-context events ─────────────────────────────────────────

#[tokio::test]
async fn contexts_share_values() {
    let storage = SharedStorage::in_memory();
    let a = storage.context();
    let b = storage.context();

    a.set("customUnits", "{}").unwrap();
    assert_eq!(b.get("customUnits").unwrap().as_deref(), Some("{}"));
    assert_ne!(a.id(), b.id());
}

#[tokio::test]
async fn write_notifies_other_contexts_only() {
    let storage = SharedStorage::in_memory();
    let a = storage.context();
    let b = storage.context();
    let mut a_events = a.events();
    let mut b_events = b.events();

    a.set("customUnits", "{\"u1\":{}}").unwrap();

    let event = b_events.recv().await.unwrap();
    assert_eq!(event.key, "customUnits");
    assert_eq!(event.origin, a.id());
    assert!(a_events.try_recv().is_none());
}

#[tokio::test]
async fn unchanged_write_is_silent() {
    let storage = SharedStorage::in_memory();
    let a = storage.context();
    let b = storage.context();
    a.set("k", "same").unwrap();

    let mut b_events = b.events();
    a.set("k", "same").unwrap();
    a.remove("missing").unwrap();

    assert!(b_events.try_recv().is_none());
}

#[tokio::test]
async fn remove_notifies() {
    let storage = SharedStorage::in_memory();
    let a = storage.context();
    let b = storage.context();
    a.set("k", "v").unwrap();

    let mut b_events = b.events();
    a.remove("k").unwrap();

    assert_eq!(b_events.try_recv().unwrap().key, "k");
}

#[tokio::test]
async fn events_close_when_storage_dropped() {
    let storage = SharedStorage::in_memory();
    let mut events = storage.context().events();
    drop(storage);
    assert!(events.recv().await.is_none());
}

// ── File persistence ─────────────────────────────────────────────

#[test]
fn open_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let storage = SharedStorage::open(dir.path().join("local.json")).unwrap();
    assert!(storage.keys().is_empty());
}

#[test]
fn writes_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("local.json");

    {
        let storage = SharedStorage::open(&path).unwrap();
        let ctx = storage.context();
        ctx.set("armyLists", "{\"a\":{}}").unwrap();
        ctx.set("customUnits", "{}").unwrap();
        ctx.remove("customUnits").unwrap();
    }

    let reopened = SharedStorage::open(&path).unwrap();
    assert_eq!(reopened.keys(), vec!["armyLists".to_string()]);
    assert_eq!(
        reopened.context().get("armyLists").unwrap().as_deref(),
        Some("{\"a\":{}}")
    );
    assert_eq!(reopened.path(), Some(path.as_path()));
}

#[test]
fn open_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(SharedStorage::open(&path).is_err());
}
