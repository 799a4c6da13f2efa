//! Task record types for `TaskTimer`.
//!
//! A [`Task`] carries the accounting state for one tracked activity. The
//! authoritative elapsed time is always `elapsed_ms` plus the in-progress
//! run (if any), so it can be recomputed at any instant from the record
//! alone. See [`Task::live_elapsed_ms`].

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Title given to tasks created or renamed with an empty title.
pub const DEFAULT_TASK_TITLE: &str = "Task";

/// Default maximum task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Opaque, stable identifier for a task.
///
/// Fresh identifiers are UUID v7 strings, so their lexical order is their
/// creation order. Identifiers read from older snapshots are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing identifier string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One tracked activity and its elapsed-time accounting.
///
/// Invariants maintained by the owning store:
/// - `running == false` implies `start_time == 0`
/// - `running == true` implies `start_time` is a real timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// User-editable label.
    pub title: String,
    /// Whether the task is currently accumulating time.
    pub running: bool,
    /// Milliseconds since epoch when the current run began, or 0 when paused.
    pub start_time: u64,
    /// Accumulated duration of all completed runs, in milliseconds.
    pub elapsed_ms: u64,
    /// RFC 3339 timestamp of the first start since creation or the last reset.
    #[serde(
        rename = "lastStartISO",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub last_start_iso: Option<String>,
}

impl Task {
    /// Creates a paused task with no accumulated time.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            running: false,
            start_time: 0,
            elapsed_ms: 0,
            last_start_iso: None,
        }
    }

    /// Elapsed time at `now_ms`, including the in-progress run.
    ///
    /// Frozen while paused, non-decreasing while running. A `now_ms`
    /// earlier than `start_time` contributes nothing rather than wrapping.
    #[must_use]
    pub const fn live_elapsed_ms(&self, now_ms: u64) -> u64 {
        if self.running {
            self.elapsed_ms
                .saturating_add(now_ms.saturating_sub(self.start_time))
        } else {
            self.elapsed_ms
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
