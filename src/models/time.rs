//! Time parsing and exact-duration helpers.
//!
//! All internal arithmetic uses a single representation: `DateTime<Utc>` for
//! instants and `TimeDelta` (integer seconds + nanoseconds) for durations.
//! Floating point appears only at the final reporting step, via [`round2`].

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Error type for timestamp and time-of-day parsing.
#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("unrecognized timestamp: {0:?}")]
    Timestamp(String),
    #[error("unrecognized time of day: {0:?}")]
    TimeOfDay(String),
}

/// Parse a UTC timestamp in either of the two source encodings:
///
/// - `YYYY-MM-DD HH:MM:SS.ffffff UTC` (trailing zone literal, microseconds)
/// - ISO-8601 `YYYY-MM-DDTHH:MM:SS[.ffffff]` with optional `Z`/offset
///
/// Values lacking an explicit zone are interpreted as UTC.
pub fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = raw.trim();

    if let Some(stripped) = trimmed.strip_suffix(" UTC") {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|_| TimeParseError::Timestamp(raw.to_string()))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Zone-less ISO-8601, with either separator.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(TimeParseError::Timestamp(raw.to_string()))
}

/// Parse a local time-of-day string (`HH:MM:SS`, seconds optional).
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, TimeParseError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| TimeParseError::TimeOfDay(raw.to_string()))
}

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        UtcSpan { start, end }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Intersection with another span, or `None` when they do not overlap.
    pub fn intersect(&self, other: &UtcSpan) -> Option<UtcSpan> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(UtcSpan { start, end })
    }

    /// Length of the intersection with another span (zero when disjoint).
    pub fn overlap_duration(&self, other: &UtcSpan) -> TimeDelta {
        self.intersect(other)
            .map(|s| s.duration())
            .unwrap_or_else(TimeDelta::zero)
    }
}

/// Exact duration in fractional seconds.
fn delta_seconds(delta: TimeDelta) -> f64 {
    delta
        .num_nanoseconds()
        .map(|ns| ns as f64 / 1e9)
        .unwrap_or_else(|| delta.num_milliseconds() as f64 / 1e3)
}

pub fn delta_to_minutes(delta: TimeDelta) -> f64 {
    delta_seconds(delta) / 60.0
}

pub fn delta_to_hours(delta: TimeDelta) -> f64 {
    delta_seconds(delta) / 3600.0
}

/// Round to two decimal places, ties to even.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    let floor = scaled.floor();
    let frac = scaled - floor;
    let rounded = if (frac - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else if frac > 0.5 {
        floor + 1.0
    } else {
        floor
    };
    rounded / 100.0
}
