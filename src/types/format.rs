//! Human-readable duration formatting for CSV columns

use chrono::{DateTime, SecondsFormat, Utc};

/// Format seconds as `m:ss`, truncating fractions.
pub fn format_min_sec(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format seconds as `h:mm:ss`, truncating fractions.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// ISO-8601 timestamp to whole seconds.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Suffix used when archiving outputs, e.g. `20250607_154200`.
pub fn archive_suffix(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}
