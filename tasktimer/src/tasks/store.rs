//! The task store: state transitions plus write-through persistence.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use tasktimer_proto::snapshot::{SchemaVersion, Snapshot, encode_snapshot};
use tasktimer_proto::task::{DEFAULT_TASK_TITLE, MAX_TASK_TITLE_LENGTH, Task, TaskId};

use super::load::{LoadReport, LoadSource, read_snapshot};
use super::{StorageWarning, TaskError};
use crate::clock::{Clock, SystemClock};
use crate::export::{ExportRow, export_rows};
use crate::storage::KeyValueStore;

/// Whether a mutation changed anything.
///
/// Idempotent operations (`start` on a running task, `pause` on a paused
/// one) report [`Transition::Unchanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The task's state changed.
    Changed,
    /// The call was a no-op.
    Unchanged,
}

/// Owns every task record and keeps the durable copy in step.
///
/// Every successful mutation re-serializes the full snapshot and writes it
/// under the canonical key before returning, so a reload right after any
/// call observes its effect.
pub struct TaskStore<S, C = SystemClock> {
    snapshot: Snapshot,
    storage: S,
    clock: C,
    max_title_len: usize,
    warnings: Vec<StorageWarning>,
    /// The durable copy is behind the in-memory snapshot.
    dirty: bool,
    /// Latest clock reading seen, so a clock stepping back never shrinks
    /// live elapsed time.
    latest_ms: AtomicU64,
}

impl<S: KeyValueStore, C: Clock> TaskStore<S, C> {
    /// Creates an empty store without reading `storage`.
    ///
    /// Call [`load`](Self::load) to pick up saved tasks, or use
    /// [`open`](Self::open).
    #[must_use]
    pub fn new(storage: S, clock: C) -> Self {
        Self {
            snapshot: Snapshot::new(),
            storage,
            clock,
            max_title_len: MAX_TASK_TITLE_LENGTH,
            warnings: Vec::new(),
            dirty: false,
            latest_ms: AtomicU64::new(0),
        }
    }

    /// Creates a store and loads saved tasks from `storage`.
    #[must_use]
    pub fn open(storage: S, clock: C) -> Self {
        let mut store = Self::new(storage, clock);
        store.load();
        store
    }

    /// Sets the maximum title length in characters.
    #[must_use]
    pub fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = max;
        self
    }

    /// Replaces in-memory state with the saved snapshot.
    ///
    /// Tries the canonical key, then legacy keys, then starts empty. The
    /// result is normalized and immediately written back under the
    /// canonical key, which completes any migration. An unparseable blob is
    /// first copied to `<key>.corrupt`. When the store could not be read at
    /// all, nothing is written back.
    pub fn load(&mut self) -> LoadReport {
        let report = self.read_saved(true);
        if report.source == LoadSource::Unavailable {
            self.dirty = true;
        } else {
            self.persist();
        }
        report
    }

    /// Like [`load`](Self::load), but never writes to storage.
    ///
    /// For viewing tasks while another session owns the data directory.
    /// Mutations on a store loaded this way still write through.
    pub fn load_read_only(&mut self) -> LoadReport {
        self.read_saved(false)
    }

    fn read_saved(&mut self, write_back: bool) -> LoadReport {
        let (mut snapshot, source) = read_snapshot(&self.storage, write_back, &mut self.warnings);
        let repaired = snapshot.normalize(self.now());
        if repaired > 0 {
            tracing::info!(repaired, "repaired saved task records");
        }
        self.snapshot = snapshot;

        let report = LoadReport {
            source,
            task_count: self.snapshot.len(),
            repaired,
        };
        tracing::info!(source = ?report.source, tasks = report.task_count, "tasks loaded");
        report
    }

    /// Creates a paused task and returns its fresh identifier.
    ///
    /// The title is trimmed; an empty title becomes `"Task"`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TitleTooLong`] if the title exceeds the
    /// configured maximum.
    pub fn create(&mut self, title: &str) -> Result<TaskId, TaskError> {
        let title = self.clean_title(title)?;
        let mut id = TaskId::generate();
        while self.snapshot.contains(&id) {
            id = TaskId::generate();
        }
        self.snapshot.insert(id.clone(), Task::new(title));
        tracing::debug!(task_id = %id, "task created");
        self.persist();
        Ok(id)
    }

    /// Starts accumulating time. No-op if already running.
    ///
    /// The first start since creation or the last reset records a start
    /// marker.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    pub fn start(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let now = self.now();
        let task = self.task_mut(id)?;
        if task.running {
            return Ok(Transition::Unchanged);
        }
        if task.elapsed_ms == 0 {
            task.last_start_iso = iso_timestamp(now);
        }
        task.running = true;
        task.start_time = now;
        tracing::debug!(task_id = %id, start_time = now, "task started");
        self.persist();
        Ok(Transition::Changed)
    }

    /// Stops accumulating time, folding the current run into the total.
    /// No-op if already paused.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    pub fn pause(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let now = self.now();
        let task = self.task_mut(id)?;
        if !fold_run(task, now) {
            return Ok(Transition::Unchanged);
        }
        tracing::debug!(task_id = %id, elapsed_ms = task.elapsed_ms, "task paused");
        self.persist();
        Ok(Transition::Changed)
    }

    /// Clears all accumulated time and the start marker, and pauses.
    ///
    /// Always persists. Reports [`Transition::Unchanged`] if the task was
    /// already paused at zero.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    pub fn reset(&mut self, id: &TaskId) -> Result<Transition, TaskError> {
        let task = self.task_mut(id)?;
        let before = task.clone();
        task.running = false;
        task.start_time = 0;
        task.elapsed_ms = 0;
        task.last_start_iso = None;
        let transition = if *task == before {
            Transition::Unchanged
        } else {
            Transition::Changed
        };
        tracing::debug!(task_id = %id, "task reset");
        self.persist();
        Ok(transition)
    }

    /// Replaces a task's title. Timing state is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown, or
    /// [`TaskError::TitleTooLong`] if the title exceeds the maximum.
    pub fn rename(&mut self, id: &TaskId, title: &str) -> Result<(), TaskError> {
        let title = self.clean_title(title)?;
        self.task_mut(id)?.title = title;
        self.persist();
        Ok(())
    }

    /// Deletes a task, returning its final record.
    ///
    /// A running task is paused first so the returned record carries its
    /// full elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    pub fn remove(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        let now = self.now();
        fold_run(self.task_mut(id)?, now);
        let task = self
            .snapshot
            .remove(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))?;
        tracing::debug!(task_id = %id, elapsed_ms = task.elapsed_ms, "task removed");
        self.persist();
        Ok(task)
    }

    /// Deletes every task, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.snapshot.len();
        self.snapshot.clear();
        tracing::info!(removed, "all tasks cleared");
        self.persist();
        removed
    }

    /// All tasks in id order (creation order for generated ids).
    #[must_use]
    pub fn list(&self) -> Vec<(&TaskId, &Task)> {
        self.snapshot.iter().collect()
    }

    /// Returns the task with `id`.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.snapshot.get(id)
    }

    /// The in-memory snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether there are no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Elapsed time for `id` right now, including any in-progress run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] if `id` is unknown.
    pub fn live_elapsed_ms(&self, id: &TaskId) -> Result<u64, TaskError> {
        self.snapshot
            .get(id)
            .map(|task| task.live_elapsed_ms(self.now()))
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    /// Live elapsed time for `id` if it exists and is running.
    #[must_use]
    pub fn running_elapsed_ms(&self, id: &TaskId) -> Option<u64> {
        self.snapshot
            .get(id)
            .filter(|task| task.running)
            .map(|task| task.live_elapsed_ms(self.now()))
    }

    /// Identifiers of all running tasks.
    #[must_use]
    pub fn running_ids(&self) -> Vec<TaskId> {
        self.snapshot
            .iter()
            .filter(|(_, task)| task.running)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// One export row per task, with running tasks measured now.
    #[must_use]
    pub fn export_rows(&self) -> Vec<ExportRow> {
        export_rows(self.snapshot.iter(), self.now())
    }

    /// Current time according to this store's clock, never earlier than
    /// any time the store has already observed.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now()
    }

    /// Whether the durable copy is behind the in-memory state.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Retries the durable write if an earlier one failed.
    ///
    /// Returns `true` if the durable copy is now current.
    pub fn flush(&mut self) -> bool {
        if self.dirty {
            self.persist();
        }
        !self.dirty
    }

    /// Drains warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<StorageWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Reads the clock, clamped to the latest reading seen so far.
    fn now(&self) -> u64 {
        let now = self.clock.now_ms();
        self.latest_ms.fetch_max(now, Ordering::Relaxed).max(now)
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, TaskError> {
        self.snapshot
            .get_mut(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    fn clean_title(&self, title: &str) -> Result<String, TaskError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(DEFAULT_TASK_TITLE.to_string());
        }
        if title.chars().count() > self.max_title_len {
            return Err(TaskError::TitleTooLong {
                max: self.max_title_len,
            });
        }
        Ok(title.to_string())
    }

    /// Writes the full snapshot under the canonical key.
    ///
    /// Failures are logged and queued as warnings; in-memory state is kept.
    fn persist(&mut self) {
        let result = encode_snapshot(&self.snapshot)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                self.storage
                    .set(SchemaVersion::CANONICAL.key(), &text)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => {
                if self.dirty {
                    tracing::info!("durable store caught up");
                }
                self.dirty = false;
            }
            Err(reason) => {
                tracing::warn!(
                    error = %reason,
                    "persist failed, keeping tasks in memory for this session"
                );
                self.dirty = true;
                self.warnings.push(StorageWarning::PersistFailed { reason });
            }
        }
    }
}

/// Folds a running task's current run into `elapsed_ms` and pauses it.
///
/// Returns `false` if the task was already paused.
fn fold_run(task: &mut Task, now_ms: u64) -> bool {
    if !task.running {
        return false;
    }
    task.elapsed_ms = task.live_elapsed_ms(now_ms);
    task.running = false;
    task.start_time = 0;
    true
}

/// Formats epoch milliseconds like JavaScript's `toISOString`.
fn iso_timestamp(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
