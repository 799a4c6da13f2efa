//! Integration tests for durable persistence.
//!
//! Covers write-through on every mutation, reload through `FileStore`,
//! migration from the legacy key, keeping unparseable data aside, one
//! writing session per data directory, and graceful degradation when
//! storage is unavailable.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use tasktimer::clock::ManualClock;
use tasktimer::storage::{DataDirLock, FileStore, KeyValueStore, MemoryStore, StorageError};
use tasktimer::tasks::{LoadSource, StorageWarning, TaskStore, corrupt_backup_key};
use tasktimer_proto::snapshot::SchemaVersion;
use tasktimer_proto::task::TaskId;

const T0: u64 = 1_700_000_000_000;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// A fresh, empty directory unique to this test.
fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tasktimer-persistence-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn titles<S: KeyValueStore>(store: &TaskStore<S, ManualClock>) -> Vec<String> {
    store.list().into_iter().map(|(_, task)| task.title.clone()).collect()
}

fn canonical_json(storage: &MemoryStore) -> serde_json::Value {
    let text = storage.peek(SchemaVersion::V2.key()).unwrap();
    serde_json::from_str(&text).unwrap()
}

// ===========================================================================
// Write-through
// ===========================================================================

#[test]
fn every_mutation_is_visible_after_reload() {
    let storage = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(T0);
    let mut store = TaskStore::open(Arc::clone(&storage), clock.clone());

    let id = store.create("Persist me").unwrap();
    store.start(&id).unwrap();
    clock.advance(800);

    // Reload mid-run: still running, same start time.
    let reloaded = TaskStore::open(Arc::clone(&storage), clock.clone());
    let task = reloaded.get(&id).unwrap();
    assert!(task.running);
    assert_eq!(task.start_time, T0);
    assert_eq!(reloaded.live_elapsed_ms(&id).unwrap(), 800);

    store.pause(&id).unwrap();
    store.rename(&id, "Renamed").unwrap();
    let reloaded = TaskStore::open(Arc::clone(&storage), clock.clone());
    let task = reloaded.get(&id).unwrap();
    assert_eq!(task.title, "Renamed");
    assert_eq!(task.elapsed_ms, 800);
    assert!(!task.running);
}

#[test]
fn canonical_json_uses_camel_case_fields() {
    let storage = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(T0);
    let mut store = TaskStore::open(Arc::clone(&storage), clock.clone());
    let id = store.create("Shape").unwrap();
    store.start(&id).unwrap();

    let json = canonical_json(&storage);
    let task = &json[id.as_str()];
    assert_eq!(task["title"], "Shape");
    assert_eq!(task["running"], true);
    assert_eq!(task["startTime"], T0);
    assert_eq!(task["elapsedMs"], 0);
    assert_eq!(task["lastStartISO"], "2023-11-14T22:13:20.000Z");
}

#[test]
fn file_store_round_trip() {
    let dir = temp_dir("round-trip");
    let clock = ManualClock::new(T0);

    let mut store = TaskStore::open(FileStore::new(&dir), clock.clone());
    let a = store.create("A").unwrap();
    let b = store.create("B").unwrap();
    store.start(&b).unwrap();
    clock.advance(1_234);
    store.pause(&b).unwrap();
    drop(store);

    assert!(dir.join("tt_tasks_v2.json").exists());
    let names: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["tt_tasks_v2.json".to_string()]);

    let mut reloaded = TaskStore::new(FileStore::new(&dir), clock);
    let report = reloaded.load();
    assert_eq!(report.source, LoadSource::Canonical);
    assert_eq!(report.task_count, 2);
    assert_eq!(reloaded.get(&a).unwrap().elapsed_ms, 0);
    assert_eq!(reloaded.get(&b).unwrap().elapsed_ms, 1_234);

    let _ = std::fs::remove_dir_all(&dir);
}

// ===========================================================================
// Migration
// ===========================================================================

#[test]
fn legacy_snapshot_is_migrated_and_rewritten() {
    let storage = Arc::new(MemoryStore::with_entries([(
        "tt_tasks",
        r#"{
            "t_1700000000000_abc12": {"title": "Old run", "running": true, "startTime": 1699999999000.7, "elapsedMs": 1500.9},
            "t_1700000000001_def34": {"title": "", "running": false, "startTime": 5, "elapsedMs": null}
        }"#,
    )]));
    let clock = ManualClock::new(T0);
    let mut store = TaskStore::new(Arc::clone(&storage), clock.clone());
    let report = store.load();

    assert_eq!(report.source, LoadSource::Migrated(SchemaVersion::V1));
    assert_eq!(report.task_count, 2);
    assert_eq!(report.repaired, 1);

    let running = TaskId::from("t_1700000000000_abc12");
    let task = store.get(&running).unwrap();
    assert!(task.running);
    assert_eq!(task.start_time, 1_699_999_999_000);
    assert_eq!(task.elapsed_ms, 1_500);
    assert_eq!(store.live_elapsed_ms(&running).unwrap(), 2_500);

    let blank = store.get(&TaskId::from("t_1700000000001_def34")).unwrap();
    assert_eq!(blank.title, "Task");
    assert_eq!(blank.start_time, 0);
    assert_eq!(blank.elapsed_ms, 0);

    // The canonical copy now exists and wins on the next load.
    let json = canonical_json(&storage);
    assert_eq!(json.as_object().unwrap().len(), 2);
    let mut again = TaskStore::new(Arc::clone(&storage), clock);
    assert_eq!(again.load().source, LoadSource::Canonical);
}

#[test]
fn canonical_key_takes_precedence_over_legacy() {
    let storage = MemoryStore::with_entries([
        ("tt_tasks", r#"{"old": {"title": "Old", "running": false, "startTime": 0, "elapsedMs": 1}}"#),
        ("tt_tasks_v2", r#"{"new": {"title": "New", "running": false, "startTime": 0, "elapsedMs": 2}}"#),
    ]);
    let store = TaskStore::open(storage, ManualClock::new(T0));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&TaskId::from("new")).unwrap().title, "New");
}

#[test]
fn malformed_canonical_falls_back_to_legacy() {
    let storage = MemoryStore::with_entries([
        ("tt_tasks_v2", "{not json"),
        ("tt_tasks", r#"{"old": {"title": "Old", "running": false, "startTime": 0, "elapsedMs": 7}}"#),
    ]);
    let mut store = TaskStore::new(storage, ManualClock::new(T0));
    let report = store.load();
    assert_eq!(report.source, LoadSource::Migrated(SchemaVersion::V1));
    assert_eq!(store.get(&TaskId::from("old")).unwrap().elapsed_ms, 7);

    let warnings = store.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0],
        StorageWarning::MalformedData { key: "tt_tasks_v2", .. }
    ));
}

#[test]
fn malformed_canonical_is_kept_before_rewrite() {
    let dir = temp_dir("corrupt");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tt_tasks_v2.json"), "{\"half\": {\"title\": \"Cut").unwrap();

    let mut store = TaskStore::new(FileStore::new(&dir), ManualClock::new(T0));
    assert_eq!(store.load().source, LoadSource::Fresh);

    let backup = corrupt_backup_key("tt_tasks_v2");
    let storage = FileStore::new(&dir);
    assert_eq!(
        storage.get(&backup).unwrap().as_deref(),
        Some("{\"half\": {\"title\": \"Cut")
    );
    assert_eq!(storage.get("tt_tasks_v2").unwrap().as_deref(), Some("{}"));

    let warnings = store.take_warnings();
    assert!(matches!(
        &warnings[..],
        [StorageWarning::MalformedData { backup: Some(b), .. }] if *b == backup
    ));
    assert!(warnings[0].to_string().contains("tt_tasks_v2.corrupt"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_canonical_is_not_overwritten_when_backup_fails() {
    let dir = temp_dir("corrupt-blocked");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tt_tasks_v2.json"), "{broken").unwrap();
    // A directory where the backup file should go.
    std::fs::create_dir_all(dir.join("tt_tasks_v2.corrupt.json")).unwrap();

    let mut store = TaskStore::new(FileStore::new(&dir), ManualClock::new(T0));
    assert_eq!(store.load().source, LoadSource::Unavailable);
    assert!(store.is_dirty());
    assert_eq!(
        std::fs::read_to_string(dir.join("tt_tasks_v2.json")).unwrap(),
        "{broken"
    );
    assert!(matches!(
        store.take_warnings().as_slice(),
        [StorageWarning::LoadFailed { key: "tt_tasks_v2", .. }]
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

// ===========================================================================
// One writing session per data directory
// ===========================================================================

#[test]
fn second_session_is_refused_while_first_holds_the_dir() {
    let dir = temp_dir("sessions");
    let clock = ManualClock::new(T0);

    let tui_lock = DataDirLock::acquire(&dir).unwrap();
    let mut tui = TaskStore::open(FileStore::new(&dir), clock.clone());
    tui.create("From TUI").unwrap();

    // A mutating command must not open a second writer on the same dir.
    assert_eq!(
        DataDirLock::acquire(&dir).unwrap_err(),
        StorageError::Locked(dir.display().to_string())
    );

    // A read-only view sees the session's tasks and writes nothing.
    let before = std::fs::read_to_string(dir.join("tt_tasks_v2.json")).unwrap();
    let mut viewer = TaskStore::new(FileStore::new(&dir), clock.clone());
    viewer.load_read_only();
    assert_eq!(titles(&viewer), vec!["From TUI"]);
    drop(viewer);

    tui.create("Later in TUI").unwrap();
    drop(tui);
    drop(tui_lock);
    assert_ne!(
        std::fs::read_to_string(dir.join("tt_tasks_v2.json")).unwrap(),
        before
    );

    // Once the session ends the command runs and keeps its changes.
    let cli_lock = DataDirLock::acquire(&dir).unwrap();
    let mut cli = TaskStore::open(FileStore::new(&dir), clock.clone());
    cli.create("From CLI").unwrap();
    drop(cli);
    drop(cli_lock);

    let reloaded = TaskStore::open(FileStore::new(&dir), clock);
    let mut saved = titles(&reloaded);
    saved.sort();
    assert_eq!(saved, vec!["From CLI", "From TUI", "Later in TUI"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn concurrent_stores_on_one_dir_always_leave_parseable_data() {
    let dir = temp_dir("torn");
    std::thread::scope(|scope| {
        for writer in 0..4 {
            let dir = dir.clone();
            scope.spawn(move || {
                let mut store = TaskStore::open(FileStore::new(&dir), ManualClock::new(T0));
                for n in 0..25 {
                    store.create(&format!("writer {writer} task {n}")).unwrap();
                }
            });
        }
    });

    let mut reloaded = TaskStore::new(FileStore::new(&dir), ManualClock::new(T0));
    assert_eq!(reloaded.load().source, LoadSource::Canonical);
    assert!(reloaded.take_warnings().is_empty());
    assert!(!reloaded.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

// ===========================================================================
// Storage unavailable
// ===========================================================================

#[test]
fn unavailable_storage_degrades_to_memory() {
    let storage = Arc::new(MemoryStore::new());
    storage.set_available(false);
    let clock = ManualClock::new(T0);

    let mut store = TaskStore::new(Arc::clone(&storage), clock.clone());
    assert_eq!(store.load().source, LoadSource::Unavailable);

    let id = store.create("In memory").unwrap();
    store.start(&id).unwrap();
    clock.advance(2_000);
    store.pause(&id).unwrap();
    assert_eq!(store.get(&id).unwrap().elapsed_ms, 2_000);

    let warnings = store.take_warnings();
    assert!(matches!(warnings[0], StorageWarning::LoadFailed { .. }));
    assert!(
        warnings[1..]
            .iter()
            .all(|w| matches!(w, StorageWarning::PersistFailed { .. }))
    );
    assert!(store.is_dirty());

    // Storage comes back: the next flush writes everything.
    storage.set_available(true);
    assert!(store.flush());
    let reloaded = TaskStore::open(Arc::clone(&storage), clock);
    assert_eq!(reloaded.get(&id).unwrap().elapsed_ms, 2_000);
}

#[test]
fn file_store_in_unwritable_location_warns() {
    let dir = temp_dir("blocked");
    std::fs::create_dir_all(dir.parent().unwrap()).unwrap();
    // A regular file where the data directory should be.
    std::fs::write(&dir, b"not a directory").unwrap();

    let storage = FileStore::new(dir.join("nested"));
    assert!(storage.set("k", "v").is_err());

    let mut store = TaskStore::open(storage, ManualClock::new(T0));
    store.create("Still works").unwrap();
    assert_eq!(store.len(), 1);
    assert!(
        store
            .take_warnings()
            .iter()
            .any(|w| matches!(w, StorageWarning::PersistFailed { .. }))
    );

    let _ = std::fs::remove_file(&dir);
}
