//! Display formatting for durations.

/// Formats a millisecond duration as zero-padded `HH:MM:SS`.
///
/// Hours are not wrapped at 24 and grow past two digits as needed
/// (`100:00:00`). Sub-second remainders are truncated.
#[must_use]
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formats a millisecond duration as `HH:MM:SS.mmm`.
#[must_use]
pub fn format_hms_millis(ms: u64) -> String {
    format!("{}.{:03}", format_hms(ms), ms % 1000)
}

/// Whole seconds contained in `ms`, rounded down.
#[must_use]
pub const fn whole_seconds(ms: u64) -> u64 {
    ms / 1000
}
