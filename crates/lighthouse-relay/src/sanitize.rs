//! Filesystem-safe names derived from a URL and a capture instant.

use chrono::{DateTime, SecondsFormat, Utc};

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_url(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// ISO 8601 instant with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn iso_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// [`iso_timestamp`] with `:` and `.` replaced by `-`.
pub fn safe_timestamp(instant: &DateTime<Utc>) -> String {
    iso_timestamp(instant).replace([':', '.'], "-")
}

/// Per-run directory name: `<sanitized url>-<safe timestamp>`.
pub fn folder_name(url: &str, instant: &DateTime<Utc>) -> String {
    format!("{}-{}", sanitize_url(url), safe_timestamp(instant))
}
