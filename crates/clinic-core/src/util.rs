//! Shared utility functions used across multiple modules.

use chrono::{DateTime, NaiveDateTime, SubsecRound};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Drop sub-millisecond precision so a timestamp survives a store round trip
/// unchanged.
pub fn truncate_to_millis(value: NaiveDateTime) -> NaiveDateTime {
    value.trunc_subsecs(3)
}

/// Timestamp as Unix milliseconds (UTC).
pub fn to_millis(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_millis()
}

/// Inverse of [`to_millis`]; `None` when out of chrono's range.
pub fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|value| value.naive_utc())
}
