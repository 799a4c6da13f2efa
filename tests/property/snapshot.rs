//! Property-based tests for the persisted snapshot schema.
//!
//! Uses proptest to verify:
//! 1. Any canonical snapshot survives encode → decode.
//! 2. Random text never causes a panic in `decode_snapshot`.
//! 3. `normalize` always leaves records satisfying the task invariants, and
//!    is idempotent.
//! 4. Legacy records with arbitrary numeric fields always decode.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use tasktimer_proto::snapshot::{SchemaVersion, Snapshot, decode_snapshot, encode_snapshot};
use tasktimer_proto::task::{Task, TaskId};

// --- Strategies ---

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    "[a-z0-9_-]{1,36}".prop_map(TaskId::from_string)
}

/// Tasks as they might appear on disk, including invariant violations.
fn arb_raw_task() -> impl Strategy<Value = Task> {
    (
        ".{0,64}",
        any::<bool>(),
        any::<u64>(),
        any::<u64>(),
        proptest::option::of("[0-9T:.Z-]{1,30}"),
    )
        .prop_map(|(title, running, start_time, elapsed_ms, last_start_iso)| Task {
            title,
            running,
            start_time,
            elapsed_ms,
            last_start_iso,
        })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::collection::vec((arb_task_id(), arb_raw_task()), 0..16)
        .prop_map(|entries| entries.into_iter().collect())
}

fn arb_legacy_number() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|n| n.to_string()),
        any::<f64>()
            .prop_filter("JSON has no NaN/inf", |f| f.is_finite())
            .prop_map(|f| format!("{f:?}")),
        Just("null".to_string()),
    ]
}

// --- Properties ---

proptest! {
    #[test]
    fn canonical_round_trip(snapshot in arb_snapshot()) {
        let text = encode_snapshot(&snapshot).unwrap();
        let decoded = decode_snapshot(SchemaVersion::V2, &text).unwrap();
        prop_assert_eq!(decoded, snapshot);
    }

    #[test]
    fn random_text_never_panics(text in ".{0,256}") {
        let _ = decode_snapshot(SchemaVersion::V2, &text);
        let _ = decode_snapshot(SchemaVersion::V1, &text);
    }

    #[test]
    fn normalize_establishes_invariants(mut snapshot in arb_snapshot(), now in 1u64..=u64::MAX) {
        snapshot.normalize(now);
        for (_, task) in snapshot.iter() {
            if task.running {
                prop_assert!(task.start_time > 0);
                prop_assert!(task.start_time <= now);
            } else {
                prop_assert_eq!(task.start_time, 0);
            }
            prop_assert!(!task.title.trim().is_empty());
        }
    }

    #[test]
    fn normalize_is_idempotent(mut snapshot in arb_snapshot(), now in any::<u64>()) {
        snapshot.normalize(now);
        let once = snapshot.clone();
        prop_assert_eq!(snapshot.normalize(now), 0);
        prop_assert_eq!(snapshot, once);
    }

    #[test]
    fn normalize_never_changes_elapsed(mut snapshot in arb_snapshot(), now in any::<u64>()) {
        let before: Vec<u64> = snapshot.iter().map(|(_, t)| t.elapsed_ms).collect();
        snapshot.normalize(now);
        let after: Vec<u64> = snapshot.iter().map(|(_, t)| t.elapsed_ms).collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn legacy_numbers_always_decode(
        start in arb_legacy_number(),
        elapsed in arb_legacy_number(),
        running in any::<bool>(),
    ) {
        let text = format!(
            r#"{{"t_1": {{"title": "Legacy", "running": {running}, "startTime": {start}, "elapsedMs": {elapsed}}}}}"#
        );
        let snapshot = decode_snapshot(SchemaVersion::V1, &text).unwrap();
        let task = snapshot.get(&TaskId::from("t_1")).unwrap();
        prop_assert_eq!(task.running, running);
        prop_assert!(task.last_start_iso.is_none());
    }
}
