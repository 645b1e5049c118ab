mod common;

use armylist_storage::{
    CategoryStore, ChangeEmitter, KeyValueStore, Record, SharedStorage, StorageContext,
    StorageEvent,
};
use armylist_sync::{
    ChangeDetector, DebounceScheduler, MemoryRemoteStore, Pusher, SyncService, SyncSession,
    SyncStatus,
};
use armylist_types::{Category, ChangeTopic, RecordId};
use common::{identity, settle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_secs(1);
const POLL: Duration = Duration::from_secs(2);

/// One browsing context with a detector wired to a debounced pusher.
struct Tab {
    storage: SharedStorage,
    context: StorageContext,
    emitter: ChangeEmitter,
    remote: Arc<MemoryRemoteStore>,
    detector: Arc<ChangeDetector>,
    session: Arc<SyncSession>,
    debounce: Arc<DebounceScheduler>,
}

impl Tab {
    fn new() -> Self {
        Self::with_watched(Category::ALL.to_vec())
    }

    fn with_watched(watched: Vec<Category>) -> Self {
        let storage = SharedStorage::in_memory();
        let context = storage.context();
        let local: Arc<dyn KeyValueStore> = Arc::new(context.clone());
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = Arc::new(SyncService::new(local.clone(), remote.clone()));
        let session = SyncSession::new(identity("alice"));
        let pusher = Pusher::new(service, session.clone(), Arc::new(SyncStatus::new()));
        let debounce = Arc::new(DebounceScheduler::new(pusher, QUIET));
        Self {
            storage,
            context,
            emitter: ChangeEmitter::new(),
            remote,
            detector: Arc::new(ChangeDetector::new(local, watched)),
            session,
            debounce,
        }
    }

    fn enable(&self) {
        self.detector
            .enable(self.session.clone(), self.debounce.clone());
    }

    fn units(&self) -> CategoryStore {
        CategoryStore::units(Arc::new(self.context.clone()), self.emitter.clone())
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

fn units_json(name: &str) -> String {
    json!({"u1": {"id": "u1", "name": name}}).to_string()
}

// ── Snapshot diffing ─────────────────────────────────────────────

#[tokio::test]
async fn disabled_detector_reports_nothing() {
    let tab = Tab::new();
    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    assert!(!tab.detector.check_for_changes());
    assert!(!tab.detector.is_enabled());
}

#[tokio::test]
async fn reports_only_actual_differences() {
    let tab = Tab::new();
    tab.context.set("customUnits", &units_json("Nob")).unwrap();
    tab.enable();

    assert!(!tab.detector.check_for_changes());

    tab.context.set("customUnits", &units_json("Boss Nob")).unwrap();
    assert!(tab.detector.check_for_changes());
    assert!(!tab.detector.check_for_changes());
    tab.debounce.cancel();
}

#[tokio::test]
async fn removal_counts_as_a_change() {
    let tab = Tab::new();
    tab.context.set("armyLists", "{}").unwrap();
    tab.enable();

    tab.context.remove("armyLists").unwrap();

    assert!(tab.detector.check_for_changes());
    tab.debounce.cancel();
}

#[tokio::test]
async fn unwatched_categories_are_ignored() {
    let tab = Tab::with_watched(vec![Category::ArmyLists]);
    tab.enable();

    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    assert!(!tab.detector.check_for_changes());
}

#[tokio::test]
async fn reenabling_for_same_identity_keeps_snapshots() {
    let tab = Tab::new();
    tab.enable();
    tab.detector.disable();

    tab.context.set("customUnits", &units_json("Nob")).unwrap();
    assert!(!tab.detector.check_for_changes());

    tab.enable();
    assert!(tab.detector.check_for_changes());
    tab.debounce.cancel();
}

#[tokio::test]
async fn enabling_for_new_identity_recaptures_snapshots() {
    let tab = Tab::new();
    tab.enable();
    tab.detector.disable();
    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    let bob = SyncSession::new(identity("bob"));
    tab.detector.enable(bob, tab.debounce.clone());

    assert!(!tab.detector.check_for_changes());
}

#[tokio::test]
async fn rebaseline_absorbs_changes_without_triggering() {
    let tab = Tab::new();
    tab.enable();
    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    tab.detector.rebaseline();

    assert!(!tab.detector.check_for_changes());
    assert!(!tab.debounce.is_pending());
}

#[tokio::test]
async fn disable_session_ignores_other_sessions() {
    let tab = Tab::new();
    tab.enable();

    tab.detector.disable_session(&SyncSession::new(identity("alice")));
    assert!(tab.detector.is_enabled());

    tab.detector.disable_session(&tab.session);
    assert!(!tab.detector.is_enabled());
}

#[tokio::test]
async fn closed_session_stops_reporting() {
    let tab = Tab::new();
    tab.enable();
    tab.session.close();

    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    assert!(!tab.detector.check_for_changes());
}

// ── Event handlers ───────────────────────────────────────────────

#[tokio::test]
async fn storage_event_for_unwatched_key_is_ignored() {
    let tab = Tab::new();
    tab.enable();
    let other = tab.storage.context();
    other.set("settings", "{}").unwrap();

    let event = StorageEvent {
        key: "settings".into(),
        origin: other.id(),
    };
    assert!(!tab.detector.on_storage_event(&event));
}

#[tokio::test]
async fn local_change_triggers_without_diff() {
    let tab = Tab::new();
    tab.enable();

    assert!(tab.detector.on_local_change(ChangeTopic::CustomUnitsChanged));
    assert!(tab.debounce.is_pending());
    tab.debounce.cancel();
}

#[tokio::test]
async fn local_change_refreshes_snapshot_and_metadata() {
    let tab = Tab::new();
    tab.enable();
    tab.context.set("armyLists", "{\"l1\":{}}").unwrap();
    tab.context.set("armyListsMetadata", "{\"l1\":{}}").unwrap();

    tab.detector.on_local_change(ChangeTopic::ArmyListsChanged);
    tab.debounce.cancel();

    assert!(!tab.detector.check_for_changes());
}

// ── Running detector ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn write_from_another_context_is_pushed() {
    let tab = Tab::new();
    tab.enable();
    let _task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);
    let other_tab = tab.storage.context();

    other_tab.set("customUnits", &units_json("Nob")).unwrap();
    settle().await;
    assert!(tab.debounce.is_pending());

    advance(1_100).await;
    assert_eq!(tab.remote.commit_count(), 1);

    advance(5_000).await;
    assert_eq!(tab.remote.commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_context_write_is_pushed_via_emitter() {
    let tab = Tab::new();
    tab.enable();
    let _task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);

    tab.units()
        .save(Record::new(RecordId::from("u1"), "Nob"))
        .unwrap();
    settle().await;
    assert!(tab.debounce.is_pending());

    advance(1_100).await;
    assert_eq!(tab.remote.commit_count(), 1);

    // The poll must not report the same write again.
    advance(5_000).await;
    assert_eq!(tab.remote.commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_is_pushed_once() {
    let tab = Tab::new();
    tab.enable();
    let _task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);
    let units = tab.units();

    for i in 0..5 {
        units
            .save(Record::new(RecordId::from("u1"), format!("Nob {i}")))
            .unwrap();
        advance(200).await;
    }
    advance(1_500).await;

    assert_eq!(tab.remote.commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unannounced_write_is_caught_by_poll() {
    let tab = Tab::new();
    tab.enable();
    let _task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);

    // Same context, raw store: neither a storage event nor a topic.
    tab.context.set("customUnits", &units_json("Nob")).unwrap();

    advance(1_500).await;
    assert!(!tab.debounce.is_pending());
    assert_eq!(tab.remote.commit_count(), 0);

    advance(1_000).await;
    assert!(tab.debounce.is_pending());

    advance(1_100).await;
    assert_eq!(tab.remote.commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_task_unsubscribes_and_stops() {
    let tab = Tab::new();
    tab.enable();
    let task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);
    assert_eq!(tab.emitter.listener_count(ChangeTopic::CustomUnitsChanged), 1);
    assert!(task.is_running());

    drop(task);
    assert_eq!(tab.emitter.listener_count(ChangeTopic::CustomUnitsChanged), 0);

    tab.storage
        .context()
        .set("customUnits", &units_json("Nob"))
        .unwrap();
    advance(5_000).await;
    assert_eq!(tab.remote.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn subscribes_only_to_watched_topics() {
    let tab = Tab::with_watched(vec![Category::ArmyLists, Category::ArmyListsMetadata]);
    let _task = tab
        .detector
        .spawn(tab.context.events(), &tab.emitter, POLL);

    assert_eq!(tab.emitter.listener_count(ChangeTopic::ArmyListsChanged), 1);
    assert_eq!(tab.emitter.listener_count(ChangeTopic::CustomUnitsChanged), 0);
    assert_eq!(
        tab.emitter
            .listener_count(ChangeTopic::CustomDetachmentsChanged),
        0
    );
}
