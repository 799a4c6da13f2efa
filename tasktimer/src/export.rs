//! CSV export of accumulated time.

use std::path::Path;

use tasktimer_proto::duration::{format_hms, whole_seconds};
use tasktimer_proto::task::{Task, TaskId};

use crate::storage::write_atomic;

/// Default export file name.
pub const DEFAULT_EXPORT_FILE: &str = "time_log.csv";

const HEADER: [&str; 4] = ["Task", "Started", "Total Seconds", "Formatted"];

/// One exported task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    /// Task title.
    pub title: String,
    /// First start since the last reset, if recorded.
    pub started: Option<String>,
    /// Whole seconds elapsed, rounded down.
    pub total_seconds: u64,
    /// Elapsed time as `HH:MM:SS`.
    pub formatted: String,
}

/// Builds export rows, measuring running tasks at `now_ms`.
pub fn export_rows<'a>(
    tasks: impl IntoIterator<Item = (&'a TaskId, &'a Task)>,
    now_ms: u64,
) -> Vec<ExportRow> {
    tasks
        .into_iter()
        .map(|(_, task)| {
            let elapsed = task.live_elapsed_ms(now_ms);
            ExportRow {
                title: task.title.clone(),
                started: task.last_start_iso.clone(),
                total_seconds: whole_seconds(elapsed),
                formatted: format_hms(elapsed),
            }
        })
        .collect()
}

/// Quotes a CSV field, doubling embedded quotes.
#[must_use]
pub fn csv_escape(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

/// Renders rows as CSV with a header line. Every field is quoted.
#[must_use]
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    push_line(&mut out, HEADER.iter().copied());
    for row in rows {
        let total = row.total_seconds.to_string();
        push_line(
            &mut out,
            [
                row.title.as_str(),
                row.started.as_deref().unwrap_or_default(),
                total.as_str(),
                row.formatted.as_str(),
            ],
        );
    }
    out
}

fn push_line<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let line: Vec<String> = fields.into_iter().map(csv_escape).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

/// Writes `csv` to `path` atomically.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be written.
pub fn write_export(path: &Path, csv: &str) -> std::io::Result<()> {
    write_atomic(path, csv.as_bytes())?;
    tracing::info!(path = %path.display(), bytes = csv.len(), "export written");
    Ok(())
}
