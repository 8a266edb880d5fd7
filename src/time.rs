//! Static-offset time arithmetic.
//!
//! Local times are computed by adding a fixed hour offset to the current
//! UTC instant. The IANA zone name stored next to the offset is never
//! consulted, so DST transitions are not applied.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;

/// A single sampled instant, rendered in both API forms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentInstant {
    /// ISO-8601 rendering, millisecond precision
    pub time: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Captures "now" once and renders both fields from the same instant.
pub fn current_instant() -> CurrentInstant {
    let now = Utc::now();
    CurrentInstant {
        time: to_iso8601(now),
        timestamp: now.timestamp_millis(),
    }
}

/// Local time for the given offset, derived from a single "now" sample.
pub fn local_time_for(offset_hours: f64) -> DateTime<Utc> {
    local_time_at(Utc::now(), offset_hours)
}

// Millisecond resolution keeps fractional offsets like 5.5 exact.
pub fn local_time_at(now: DateTime<Utc>, offset_hours: f64) -> DateTime<Utc> {
    now + TimeDelta::milliseconds((offset_hours * 3_600_000.0).round() as i64)
}

pub fn to_iso8601(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
