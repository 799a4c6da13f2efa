//! Periodic display refresh for running tasks.
//!
//! A [`TickScheduler`] keeps at most one periodic registration per task id.
//! Each registration is a tokio task driving an interval; on every tick it
//! re-reads live state through a sampler and hands the value to a callback.
//! Ticking never mutates task state, so a late or missed tick only delays
//! what is displayed.

use std::collections::HashMap;
use std::time::Duration;

use tasktimer_proto::task::TaskId;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Smallest accepted tick interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Owns the periodic refresh registrations, keyed by task id.
///
/// Dropping the scheduler cancels every registration.
#[derive(Default)]
pub struct TickScheduler {
    handles: HashMap<TaskId, JoinHandle<()>>,
}

impl TickScheduler {
    /// Creates a scheduler with no registrations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins calling `on_tick` every `interval` for `id`.
    ///
    /// On each tick `sampler` is called to read the task's live elapsed time;
    /// `None` means the task is no longer running, which ends the
    /// registration without calling `on_tick`. The first tick fires one
    /// interval after registration.
    ///
    /// Returns `false` and leaves the existing registration alone if `id`
    /// is already ticking.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_ticking<P, F>(
        &mut self,
        id: TaskId,
        interval: Duration,
        sampler: P,
        mut on_tick: F,
    ) -> bool
    where
        P: Fn() -> Option<u64> + Send + 'static,
        F: FnMut(u64) + Send + 'static,
    {
        if self.is_ticking(&id) {
            tracing::debug!(task_id = %id, "duplicate tick registration ignored");
            return false;
        }

        let period = interval.max(MIN_INTERVAL);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let Some(live_ms) = sampler() else {
                    tracing::trace!(task_id = %task_id, "task no longer running, ticker exiting");
                    break;
                };
                on_tick(live_ms);
            }
        });

        tracing::debug!(task_id = %id, interval_ms = period.as_millis(), "ticking started");
        self.handles.insert(id, handle);
        true
    }

    /// Cancels the registration for `id`. Safe to call when none exists.
    ///
    /// Returns whether a registration was removed.
    pub fn stop_ticking(&mut self, id: &TaskId) -> bool {
        match self.handles.remove(id) {
            Some(handle) => {
                handle.abort();
                tracing::debug!(task_id = %id, "ticking stopped");
                true
            }
            None => false,
        }
    }

    /// Cancels every registration, returning how many were removed.
    pub fn stop_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        if count > 0 {
            tracing::debug!(count, "all ticking stopped");
        }
        count
    }

    /// Whether `id` has a live registration.
    #[must_use]
    pub fn is_ticking(&self, id: &TaskId) -> bool {
        self.handles.get(id).is_some_and(|h| !h.is_finished())
    }

    /// Number of live registrations.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.handles.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
