//! Persisted data model for `TaskTimer`.

pub mod duration;
pub mod snapshot;
pub mod task;
