//! One-shot command execution for the non-interactive CLI.

use std::io::Write;

use tasktimer_proto::duration::format_hms;
use tasktimer_proto::task::TaskId;

use crate::clock::Clock;
use crate::config::CliCommand;
use crate::export::{to_csv, write_export};
use crate::storage::KeyValueStore;
use crate::tasks::{TaskError, TaskStore, Transition};

/// Errors from a one-shot command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The store rejected the operation.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// No task id starts with the given prefix.
    #[error("no task matches {0:?}")]
    NoMatch(String),

    /// More than one task id starts with the given prefix.
    #[error("{count} tasks match {prefix:?}, use a longer prefix")]
    Ambiguous {
        /// The prefix given.
        prefix: String,
        /// How many ids matched.
        count: usize,
    },

    /// `clear` was run without `--yes`.
    #[error("refusing to delete all tasks without --yes")]
    ClearNotConfirmed,

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `command` changes saved tasks and so needs the data directory
/// lock.
#[must_use]
pub const fn mutates(command: &CliCommand) -> bool {
    !matches!(command, CliCommand::List | CliCommand::Export { .. })
}

/// Finds the task whose id is `prefix` or uniquely starts with it.
///
/// # Errors
///
/// Returns [`CliError::NoMatch`] or [`CliError::Ambiguous`].
pub fn resolve_id<S: KeyValueStore, C: Clock>(
    store: &TaskStore<S, C>,
    prefix: &str,
) -> Result<TaskId, CliError> {
    let exact = TaskId::from(prefix);
    if store.get(&exact).is_some() {
        return Ok(exact);
    }

    let matches: Vec<&TaskId> = store
        .list()
        .into_iter()
        .map(|(id, _)| id)
        .filter(|id| id.as_str().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::NoMatch(prefix.to_string())),
        [id] => Ok((*id).clone()),
        _ => Err(CliError::Ambiguous {
            prefix: prefix.to_string(),
            count: matches.len(),
        }),
    }
}

/// Runs one command against `store`, writing human-readable output to `out`.
///
/// # Errors
///
/// Returns [`CliError`] if the task cannot be found, the command is
/// rejected, or output cannot be written.
pub fn run_command<S: KeyValueStore, C: Clock>(
    store: &mut TaskStore<S, C>,
    command: &CliCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        CliCommand::Add { title } => {
            let id = store.create(title)?;
            writeln!(out, "{id}")?;
        }
        CliCommand::Start { id } => {
            let id = resolve_id(store, id)?;
            let note = match store.start(&id)? {
                Transition::Changed => "started",
                Transition::Unchanged => "already running",
            };
            writeln!(out, "{id} {note}")?;
        }
        CliCommand::Pause { id } => {
            let id = resolve_id(store, id)?;
            let note = match store.pause(&id)? {
                Transition::Changed => "paused",
                Transition::Unchanged => "already paused",
            };
            let elapsed = store.live_elapsed_ms(&id)?;
            writeln!(out, "{id} {note} at {}", format_hms(elapsed))?;
        }
        CliCommand::Reset { id } => {
            let id = resolve_id(store, id)?;
            store.reset(&id)?;
            writeln!(out, "{id} reset")?;
        }
        CliCommand::Rename { id, title } => {
            let id = resolve_id(store, id)?;
            store.rename(&id, title)?;
            writeln!(out, "{id} renamed")?;
        }
        CliCommand::Rm { id } => {
            let id = resolve_id(store, id)?;
            let task = store.remove(&id)?;
            writeln!(
                out,
                "removed {:?} ({})",
                task.title,
                format_hms(task.elapsed_ms)
            )?;
        }
        CliCommand::List => {
            let now = store.now_ms();
            for (id, task) in store.list() {
                let marker = if task.running { "▶" } else { " " };
                writeln!(
                    out,
                    "{marker} {id}  {}  {}",
                    format_hms(task.live_elapsed_ms(now)),
                    task.title
                )?;
            }
        }
        CliCommand::Export { output } => {
            let csv = to_csv(&store.export_rows());
            match output {
                Some(path) => write_export(path, &csv)?,
                None => out.write_all(csv.as_bytes())?,
            }
        }
        CliCommand::Clear { yes } => {
            if !yes {
                return Err(CliError::ClearNotConfirmed);
            }
            let removed = store.clear();
            writeln!(out, "removed {removed} tasks")?;
        }
    }
    Ok(())
}
