//! Versioned snapshot loading.
//!
//! Tries each key in [`SchemaVersion::LOAD_ORDER`]. A blob that fails to
//! parse is copied to `<key>.corrupt`, then treated as absent and the next
//! version is tried. A read failure, or a failed copy, stops the search:
//! the durable copy is in an unknown state, so nothing older is promoted
//! over it.

use tasktimer_proto::snapshot::{SchemaVersion, Snapshot, decode_snapshot};

use super::StorageWarning;
use crate::storage::KeyValueStore;

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Nothing stored; started empty.
    Fresh,
    /// Read from the canonical key.
    Canonical,
    /// Read from an older schema and migrated.
    Migrated(SchemaVersion),
    /// The store could not be read; started empty in memory.
    Unavailable,
}

/// Summary of a [`TaskStore::load`](super::TaskStore::load) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Where the tasks came from.
    pub source: LoadSource,
    /// Number of tasks loaded.
    pub task_count: usize,
    /// Number of records repaired during normalization.
    pub repaired: usize,
}

/// Key an unparseable blob under `key` is copied to.
#[must_use]
pub fn corrupt_backup_key(key: &str) -> String {
    format!("{key}.corrupt")
}

/// Reads the newest parseable snapshot from `storage`.
///
/// With `keep_corrupt`, unparseable blobs are copied aside before being
/// skipped. Problems encountered along the way are appended to `warnings`.
pub(crate) fn read_snapshot<S: KeyValueStore>(
    storage: &S,
    keep_corrupt: bool,
    warnings: &mut Vec<StorageWarning>,
) -> (Snapshot, LoadSource) {
    for version in SchemaVersion::LOAD_ORDER {
        let key = version.key();
        let text = match storage.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(key, error = %err, "durable store unreadable, starting empty");
                warnings.push(StorageWarning::LoadFailed {
                    key,
                    reason: err.to_string(),
                });
                return (Snapshot::new(), LoadSource::Unavailable);
            }
        };

        match decode_snapshot(version, &text) {
            Ok(snapshot) => {
                let source = if version == SchemaVersion::CANONICAL {
                    LoadSource::Canonical
                } else {
                    tracing::info!(key, %version, tasks = snapshot.len(), "migrating saved tasks");
                    LoadSource::Migrated(version)
                };
                return (snapshot, source);
            }
            Err(err) => {
                let backup = if keep_corrupt {
                    let backup = corrupt_backup_key(key);
                    if let Err(write_err) = storage.set(&backup, &text) {
                        tracing::warn!(
                            key,
                            %backup,
                            error = %write_err,
                            "could not keep malformed saved tasks"
                        );
                        warnings.push(StorageWarning::LoadFailed {
                            key,
                            reason: format!("unparseable and not backed up: {write_err}"),
                        });
                        return (Snapshot::new(), LoadSource::Unavailable);
                    }
                    Some(backup)
                } else {
                    None
                };
                tracing::warn!(key, ?backup, error = %err, "ignoring malformed saved tasks");
                warnings.push(StorageWarning::MalformedData {
                    key,
                    reason: err.to_string(),
                    backup,
                });
            }
        }
    }
    (Snapshot::new(), LoadSource::Fresh)
}
