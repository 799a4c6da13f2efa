//! Authoritative task records and their elapsed-time accounting.
//!
//! [`TaskStore`] owns the id-to-task mapping and writes the whole mapping
//! through to a [`KeyValueStore`](crate::storage::KeyValueStore) after every
//! mutation. Persistence failures never fail an operation: they surface as
//! [`StorageWarning`]s and the store keeps working in memory.

pub mod load;
pub mod store;

pub use load::{LoadReport, LoadSource, corrupt_backup_key};
pub use store::{TaskStore, Transition};

use tasktimer_proto::task::TaskId;
use thiserror::Error;

/// Errors that can occur during task operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Task with the given ID was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {max} characters)")]
    TitleTooLong {
        /// Configured maximum in characters.
        max: usize,
    },
}

/// A non-fatal persistence problem, for display to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageWarning {
    /// The snapshot could not be written; changes live only in memory.
    PersistFailed {
        /// Description of the error.
        reason: String,
    },
    /// A stored snapshot could not be read.
    LoadFailed {
        /// Key that was being read.
        key: &'static str,
        /// Description of the error.
        reason: String,
    },
    /// A stored snapshot could not be parsed and was ignored.
    MalformedData {
        /// Key holding the unparseable blob.
        key: &'static str,
        /// Description of the parse error.
        reason: String,
        /// Key the unparseable text was copied to, if it was kept.
        backup: Option<String>,
    },
}

impl std::fmt::Display for StorageWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersistFailed { reason } => {
                write!(f, "changes not saved ({reason})")
            }
            Self::LoadFailed { key, reason } => {
                write!(f, "could not read saved tasks from {key} ({reason})")
            }
            Self::MalformedData {
                key,
                reason,
                backup,
            } => {
                write!(f, "ignored unreadable saved tasks in {key} ({reason})")?;
                match backup {
                    Some(backup) => write!(f, ", copy kept in {backup}"),
                    None => Ok(()),
                }
            }
        }
    }
}
