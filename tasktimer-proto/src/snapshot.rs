//! Snapshot schema and codec for persisted task state.
//!
//! The entire task mapping is stored as a single JSON object under one key
//! of the durable store. Two schema versions exist:
//!
//! - [`SchemaVersion::V1`] (`tt_tasks`): the first, legacy format. Numbers were
//!   written by a JavaScript runtime and may be fractional or negative.
//!   There is no start marker.
//! - [`SchemaVersion::V2`] (`tt_tasks_v2`): the canonical format, written by
//!   [`encode_snapshot`]. Integer milliseconds plus the optional
//!   `lastStartISO` marker.
//!
//! Loading tries versions in [`SchemaVersion::LOAD_ORDER`]; whatever is
//! found is normalized and rewritten as V2.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::task::{DEFAULT_TASK_TITLE, Task, TaskId};

/// Persisted schema versions, newest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// Legacy format under `tt_tasks`.
    V1,
    /// Canonical format under `tt_tasks_v2`.
    V2,
}

impl SchemaVersion {
    /// The version every save is written in.
    pub const CANONICAL: Self = Self::V2;

    /// Versions to try on load, in precedence order.
    pub const LOAD_ORDER: [Self; 2] = [Self::V2, Self::V1];

    /// Storage key holding a snapshot of this version.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::V1 => "tt_tasks",
            Self::V2 => "tt_tasks_v2",
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// Errors produced by the snapshot codec.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The stored text could not be parsed as the expected schema.
    #[error("malformed {version} snapshot: {source}")]
    Malformed {
        /// Schema the text was parsed as.
        version: SchemaVersion,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// The snapshot could not be serialized.
    #[error("snapshot encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The full id-to-task mapping; the unit of persistence.
///
/// Backed by an ordered map so iteration follows id order, which for
/// generated ids is creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    tasks: BTreeMap<TaskId, Task>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there are no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a task with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Returns the task with `id`.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Returns the task with `id` for mutation.
    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Inserts or replaces a task, returning the previous record.
    pub fn insert(&mut self, id: TaskId, task: Task) -> Option<Task> {
        self.tasks.insert(id, task)
    }

    /// Removes a task, returning it if present.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.tasks.remove(id)
    }

    /// Removes every task.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Iterates tasks in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &Task)> {
        self.tasks.iter()
    }

    /// Repairs records that violate the accounting invariants.
    ///
    /// - paused tasks get `start_time = 0`
    /// - running tasks without a start time become paused
    /// - running tasks that started after `now_ms` are clamped to `now_ms`
    /// - empty titles become [`DEFAULT_TASK_TITLE`]
    ///
    /// Returns the number of records changed.
    pub fn normalize(&mut self, now_ms: u64) -> usize {
        let mut repaired = 0;
        for task in self.tasks.values_mut() {
            let before = task.clone();
            if task.running && task.start_time > now_ms {
                task.start_time = now_ms;
            }
            if task.start_time == 0 {
                task.running = false;
            }
            if !task.running {
                task.start_time = 0;
            }
            if task.title.trim().is_empty() {
                task.title = DEFAULT_TASK_TITLE.to_string();
            }
            if *task != before {
                repaired += 1;
            }
        }
        repaired
    }
}

impl FromIterator<(TaskId, Task)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (TaskId, Task)>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// A task record as written by the legacy format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTask {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    running: bool,
    // JS writes NaN as null.
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    elapsed_ms: Option<f64>,
}

impl From<LegacyTask> for Task {
    fn from(legacy: LegacyTask) -> Self {
        Self {
            title: legacy.title.unwrap_or_default(),
            running: legacy.running,
            start_time: legacy.start_time.map_or(0, millis_from_f64),
            elapsed_ms: legacy.elapsed_ms.map_or(0, millis_from_f64),
            last_start_iso: None,
        }
    }
}

/// Floors a JS millisecond number into a non-negative integer.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis_from_f64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        // Positive and floored; `as` saturates above u64::MAX.
        value.floor() as u64
    } else {
        0
    }
}

/// Encodes a snapshot in the canonical schema.
///
/// # Errors
///
/// Returns [`SnapshotError::Encode`] if serialization fails.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decodes snapshot text written in the given schema version.
///
/// # Errors
///
/// Returns [`SnapshotError::Malformed`] if `text` does not parse as
/// `version`.
pub fn decode_snapshot(version: SchemaVersion, text: &str) -> Result<Snapshot, SnapshotError> {
    let malformed = |source| SnapshotError::Malformed { version, source };
    match version {
        SchemaVersion::V2 => serde_json::from_str(text).map_err(malformed),
        SchemaVersion::V1 => {
            let legacy: BTreeMap<String, LegacyTask> =
                serde_json::from_str(text).map_err(malformed)?;
            Ok(legacy
                .into_iter()
                .map(|(id, task)| (TaskId::from_string(id), Task::from(task)))
                .collect())
        }
    }
}
