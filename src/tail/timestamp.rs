//! Timestamp codec for the search engine's zoned date-time strings.
//!
//! Parsing is fail-open: a malformed value becomes [`zero`], so any window
//! computed from it reaches back to the beginning instead of aborting the run.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Sentinel returned for timestamps that cannot be parsed.
#[must_use]
pub fn zero() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |naive| Utc.from_utc_datetime(&naive))
}

/// Parse an RFC 3339 timestamp (`2006-01-02T15:04:05.999Z07:00` style).
///
/// Returns [`zero`] if the value is malformed.
#[must_use]
pub fn parse(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(timestamp = %value, error = %e, "Unparseable timestamp, using zero time");
            zero()
        }
    }
}

/// Format a timestamp in canonical form: UTC, millisecond precision, `Z` suffix.
///
/// The output is fixed-width, so lexicographic order of formatted values
/// equals chronological order.
#[must_use]
pub fn format(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Subtract `window` from `time`, saturating at the earliest representable instant.
#[must_use]
pub fn rewind(time: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    time.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
