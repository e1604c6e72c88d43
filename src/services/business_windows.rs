//! Business-hour window materialization.
//!
//! Converts a store's weekly local-time schedule into concrete UTC intervals
//! covering the 7-day reference horizon. Eight local calendar dates are
//! enumerated (not seven) because the local date spanning `now - 7d` may
//! differ from the one spanning `now` due to zone offsets.

use chrono::{Datelike, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::models::{parse_time_of_day, BusinessSchedule, UtcSpan};

/// Fallback zone for stores with no (or an unknown) timezone record.
pub const FALLBACK_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Annotation attached to rows whose timezone string failed IANA lookup.
pub const WARN_UNKNOWN_ZONE: &str = "unknown_zone";

/// Annotation attached to rows whose schedule contained unparseable times.
pub const WARN_SCHEDULE_PARSE: &str = "schedule_parse_error";

/// Resolve a store's IANA timezone string.
///
/// A missing record means the store is simply assumed to be in the fallback
/// zone; an unparseable identifier also falls back but is surfaced as a
/// warning so DST-sensitive rows can be flagged downstream.
pub fn resolve_timezone(raw: Option<&str>) -> (Tz, Option<&'static str>) {
    match raw {
        None => (FALLBACK_TIMEZONE, None),
        Some(name) => match name.trim().parse::<Tz>() {
            Ok(tz) => (tz, None),
            Err(_) => {
                warn!(zone = name, "unknown IANA zone, falling back to {}", FALLBACK_TIMEZONE);
                (FALLBACK_TIMEZONE, Some(WARN_UNKNOWN_ZONE))
            }
        },
    }
}

/// Localize a wall-clock datetime in `tz` and convert to UTC.
///
/// Ambiguous times (fall-back overlap) take the earlier of the two candidate
/// instants. Non-existent times (spring-forward gap) shift forward an hour at
/// a time until the zone resolves; `None` only for pathological zone data.
fn localize_to_utc(tz: Tz, naive: NaiveDateTime) -> Option<chrono::DateTime<Utc>> {
    let mut probe = naive;
    for _ in 0..24 {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => probe += TimeDelta::hours(1),
        }
    }
    None
}

/// Materialize the business-hour windows intersecting the reference horizon.
///
/// A store with no schedule is always open: a single window spanning the
/// whole horizon. Otherwise each of the 8 local calendar dates covering the
/// horizon contributes one window when its weekday has a schedule entry.
/// Malformed entries skip that window and add a warning; windows that
/// collapse to zero length after DST normalization are dropped.
pub fn business_windows(
    schedule: Option<&BusinessSchedule>,
    tz: Tz,
    horizon: UtcSpan,
    warnings: &mut Vec<String>,
) -> Vec<UtcSpan> {
    let Some(schedule) = schedule else {
        return vec![horizon];
    };

    let start_date = horizon.start.with_timezone(&tz).date_naive();
    let mut windows = Vec::with_capacity(8);

    for offset in 0..8u64 {
        let Some(date) = start_date.checked_add_days(chrono::Days::new(offset)) else {
            continue;
        };
        let day_of_week = date.weekday().num_days_from_monday() as u8;
        let Some(entry) = schedule.entry_for(day_of_week) else {
            continue;
        };

        let (open, close) = match (parse_time_of_day(&entry.open), parse_time_of_day(&entry.close))
        {
            (Ok(open), Ok(close)) => (open, close),
            _ => {
                warn!(%date, open = %entry.open, close = %entry.close, "skipping malformed schedule entry");
                if !warnings.iter().any(|w| w == WARN_SCHEDULE_PARSE) {
                    warnings.push(WARN_SCHEDULE_PARSE.to_string());
                }
                continue;
            }
        };

        let (Some(start_utc), Some(end_utc)) = (
            localize_to_utc(tz, date.and_time(open)),
            localize_to_utc(tz, date.and_time(close)),
        ) else {
            warn!(%date, %tz, "skipping window: local time did not resolve");
            continue;
        };

        let window = UtcSpan::new(start_utc, end_utc);
        if !window.is_empty() {
            windows.push(window);
        }
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{delta_to_hours, parse_utc_timestamp, round2};
    use chrono::NaiveDate;

    fn horizon(start: &str, end: &str) -> UtcSpan {
        UtcSpan::new(
            parse_utc_timestamp(start).unwrap(),
            parse_utc_timestamp(end).unwrap(),
        )
    }

    fn all_day_schedule() -> BusinessSchedule {
        let mut schedule = BusinessSchedule::new();
        for day in 0..7 {
            schedule.set_day(day, "00:00:00", "23:59:59");
        }
        schedule
    }

    #[test]
    fn test_resolve_timezone() {
        let (tz, warning) = resolve_timezone(Some("America/New_York"));
        assert_eq!(tz, chrono_tz::America::New_York);
        assert!(warning.is_none());

        let (tz, warning) = resolve_timezone(None);
        assert_eq!(tz, FALLBACK_TIMEZONE);
        assert!(warning.is_none());

        let (tz, warning) = resolve_timezone(Some("Mars/Olympus_Mons"));
        assert_eq!(tz, FALLBACK_TIMEZONE);
        assert_eq!(warning, Some(WARN_UNKNOWN_ZONE));
    }

    #[test]
    fn test_no_schedule_means_always_open() {
        let span = horizon("2024-01-01T00:00:00Z", "2024-01-08T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(None, chrono_tz::UTC, span, &mut warnings);

        assert_eq!(windows, vec![span]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_weekday_windows_in_new_york() {
        // Mon-Fri 09:00-17:00 Eastern, a January week (EST, UTC-5).
        let mut schedule = BusinessSchedule::new();
        for day in 0..5 {
            schedule.set_day(day, "09:00:00", "17:00:00");
        }
        let span = horizon("2024-01-06T00:00:00Z", "2024-01-13T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::America::New_York,
            span,
            &mut warnings,
        );

        // Local dates 2024-01-05 (Fri) through 2024-01-12 (Fri): six weekdays.
        assert_eq!(windows.len(), 6);
        assert_eq!(
            windows[1].start,
            parse_utc_timestamp("2024-01-08T14:00:00Z").unwrap()
        );
        assert_eq!(
            windows[1].end,
            parse_utc_timestamp("2024-01-08T22:00:00Z").unwrap()
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_day_is_closed() {
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(0, "09:00:00", "17:00:00");
        let span = horizon("2024-01-06T00:00:00Z", "2024-01-13T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::UTC,
            span,
            &mut warnings,
        );

        // Exactly one Monday (2024-01-08) in the enumerated dates.
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration(), TimeDelta::hours(8));
    }

    #[test]
    fn test_malformed_entry_skips_window_and_warns() {
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(0, "nine", "17:00:00");
        schedule.set_day(1, "09:00:00", "17:00:00");
        let span = horizon("2024-01-06T00:00:00Z", "2024-01-13T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::UTC,
            span,
            &mut warnings,
        );

        assert_eq!(windows.len(), 1); // Tuesday survives
        assert_eq!(warnings, vec![WARN_SCHEDULE_PARSE.to_string()]);
    }

    #[test]
    fn test_inverted_entry_is_dropped() {
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(0, "17:00:00", "09:00:00");
        let span = horizon("2024-01-06T00:00:00Z", "2024-01-13T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::UTC,
            span,
            &mut warnings,
        );

        assert!(windows.is_empty());
    }

    #[test]
    fn test_spring_forward_day_window_is_one_hour_short() {
        // US DST began 2024-03-10 at 02:00 local.
        let span = horizon("2024-03-05T00:00:00Z", "2024-03-12T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&all_day_schedule()),
            chrono_tz::America::New_York,
            span,
            &mut warnings,
        );

        let dst_day = windows
            .iter()
            .find(|w| {
                w.start == parse_utc_timestamp("2024-03-10T05:00:00Z").unwrap()
            })
            .expect("window for 2024-03-10");
        assert_eq!(
            dst_day.duration(),
            TimeDelta::hours(23) - TimeDelta::seconds(1)
        );

        // The seven full local days 03-05..03-11 schedule one hour less than
        // a plain week: 167h minus the seven end-of-day seconds.
        let week_start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let total = windows
            .iter()
            .filter(|w| {
                let local_date = w
                    .start
                    .with_timezone(&chrono_tz::America::New_York)
                    .date_naive();
                local_date >= week_start
            })
            .fold(TimeDelta::zero(), |acc, w| acc + w.duration());
        assert_eq!(round2(delta_to_hours(total)), 167.0);
    }

    #[test]
    fn test_open_time_inside_dst_gap_shifts_forward() {
        // 02:30 does not exist on 2024-03-10 in New York; it resolves one
        // hour later (03:30 EDT = 07:30 UTC).
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(6, "02:30:00", "12:00:00"); // Sunday
        let span = horizon("2024-03-05T00:00:00Z", "2024-03-12T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::America::New_York,
            span,
            &mut warnings,
        );

        assert_eq!(windows.len(), 1);
        assert_eq!(
            windows[0].start,
            parse_utc_timestamp("2024-03-10T07:30:00Z").unwrap()
        );
    }

    #[test]
    fn test_ambiguous_fall_back_takes_earlier_instant() {
        // 01:30 occurs twice on 2024-11-03 in New York; the earlier UTC
        // candidate is the EDT one (05:30 UTC).
        let mut schedule = BusinessSchedule::new();
        schedule.set_day(6, "01:30:00", "12:00:00"); // Sunday
        let span = horizon("2024-10-29T00:00:00Z", "2024-11-05T00:00:00Z");
        let mut warnings = Vec::new();
        let windows = business_windows(
            Some(&schedule),
            chrono_tz::America::New_York,
            span,
            &mut warnings,
        );

        assert_eq!(windows.len(), 1);
        assert_eq!(
            windows[0].start,
            parse_utc_timestamp("2024-11-03T05:30:00Z").unwrap()
        );
    }
}
