//! Integration tests for display refresh of running tasks.
//!
//! Runs a `Tracker` on tokio's paused clock, with a task clock that follows
//! tokio time, and checks that ticks follow the task through start, pause,
//! reset and deletion.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tasktimer::clock::Clock;
use tasktimer::storage::MemoryStore;
use tasktimer::tasks::TaskStore;
use tasktimer::tracker::{Command, TaskCommands, TickEvent, TickSink, Tracker};
use tokio::time::Instant;

const T0: u64 = 1_700_000_000_000;
const INTERVAL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Epoch clock driven by tokio's (pausable) time.
struct TokioClock {
    base: Instant,
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.base.elapsed().as_millis()).unwrap();
        T0 + elapsed
    }
}

type Events = Arc<Mutex<Vec<TickEvent>>>;

fn make_tracker() -> (Tracker<MemoryStore, TokioClock>, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink: TickSink = Arc::new(move |event| sink_events.lock().push(event));
    let clock = TokioClock {
        base: Instant::now(),
    };
    let store = TaskStore::open(MemoryStore::new(), clock);
    (Tracker::new(store, INTERVAL, sink), events)
}

/// Lets paused tokio time run forward, firing every tick due on the way.
async fn run_for(total: Duration) {
    tokio::time::sleep(total).await;
}

fn live_values(events: &Events) -> Vec<u64> {
    events.lock().iter().map(|e| e.live_ms).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn running_task_ticks_with_live_elapsed() {
    let (mut tracker, events) = make_tracker();
    let id = tracker.create("Tick").unwrap();
    tracker.start(&id).unwrap();

    run_for(Duration::from_millis(1_010)).await;

    assert_eq!(live_values(&events), vec![250, 500, 750, 1_000]);
    assert!(events.lock().iter().all(|e| e.id == id));
}

#[tokio::test(start_paused = true)]
async fn pause_between_ticks_stops_refresh() {
    let (mut tracker, events) = make_tracker();
    let id = tracker.create("Pause").unwrap();
    tracker.start(&id).unwrap();

    run_for(Duration::from_millis(600)).await;
    tracker.pause(&id).unwrap();
    let after_pause = events.lock().len();
    assert_eq!(after_pause, 2);

    run_for(Duration::from_millis(2_000)).await;
    assert_eq!(events.lock().len(), after_pause);

    let store = tracker.store();
    assert_eq!(store.lock().get(&id).unwrap().elapsed_ms, 600);
}

#[tokio::test(start_paused = true)]
async fn deleting_running_task_stops_callbacks() {
    let (mut tracker, events) = make_tracker();
    let id = tracker.create("Doomed").unwrap();
    tracker.start(&id).unwrap();
    run_for(Duration::from_millis(300)).await;

    tracker.apply(Command::Remove(id.clone())).unwrap();
    assert!(!tracker.scheduler().is_ticking(&id));
    let seen = events.lock().len();

    run_for(Duration::from_millis(2_000)).await;
    assert_eq!(events.lock().len(), seen);
    assert!(tracker.store().lock().get(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn reset_then_restart_ticks_from_zero() {
    let (mut tracker, events) = make_tracker();
    let id = tracker.create("Again").unwrap();
    tracker.start(&id).unwrap();
    run_for(Duration::from_millis(1_000)).await;

    tracker.reset(&id).unwrap();
    events.lock().clear();
    tracker.start(&id).unwrap();
    run_for(Duration::from_millis(510)).await;

    assert_eq!(live_values(&events), vec![250, 500]);
}

#[tokio::test(start_paused = true)]
async fn each_running_task_has_one_registration() {
    let (mut tracker, events) = make_tracker();
    let a = tracker.create("A").unwrap();
    let b = tracker.create("B").unwrap();
    tracker.start(&a).unwrap();
    tracker.start(&a).unwrap();
    tracker.start(&b).unwrap();
    assert_eq!(tracker.scheduler().active_count(), 2);

    run_for(Duration::from_millis(510)).await;
    let events = events.lock();
    assert_eq!(events.iter().filter(|e| e.id == a).count(), 2);
    assert_eq!(events.iter().filter(|e| e.id == b).count(), 2);
}
