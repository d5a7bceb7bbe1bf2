//! Human-readable renderings of durations and sizes reported by the player.

/// `mm:ss`, or `hh:mm:ss` once the hour part is non-zero.
pub fn format_time(time_ms: u64) -> String {
    let total_secs = time_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Seconds variant used by the progress display.
pub fn format_secs(secs: f64) -> String {
    format_time((secs.max(0.0) * 1000.0) as u64)
}

/// Bytes as MB above one megabyte, KB otherwise.
pub fn format_file_size(size_bytes: u64) -> String {
    const MEGABYTE: u64 = 1_048_576;
    if size_bytes > MEGABYTE {
        format!("{:.2} MB", size_bytes as f64 / MEGABYTE as f64)
    } else {
        format!("{:.2} KB", size_bytes as f64 / 1024.0)
    }
}
