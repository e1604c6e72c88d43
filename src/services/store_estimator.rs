//! Per-store uptime/downtime estimation.
//!
//! A pure function of `(store_id, now)` plus the data-access handle: resolve
//! zone and schedule, read the week's polls, materialize windows, build the
//! status signal, and accumulate overlaps for the week/day/hour scopes. The
//! day and hour metrics come from re-accumulating against clipped windows,
//! never from dividing the week totals.

use chrono::{DateTime, TimeDelta, Utc};

use crate::api::{ReportRow, StoreId};
use crate::db::repository::{FullRepository, RepositoryResult};
use crate::db::services::with_retry;
use crate::models::{delta_to_hours, delta_to_minutes, round2, UtcSpan};
use crate::services::business_windows::{business_windows, resolve_timezone};
use crate::services::overlap::{accumulate, clip_windows};
use crate::services::status_signal::{build_status_segments, WARN_NO_POLLS};

/// Compute one store's report row against the reference instant `now`.
pub async fn estimate_store(
    repo: &dyn FullRepository,
    store_id: &StoreId,
    now: DateTime<Utc>,
) -> RepositoryResult<ReportRow> {
    let horizon = UtcSpan::new(now - TimeDelta::days(7), now);
    let mut warnings = Vec::new();

    let timezone_raw = with_retry("timezone_for", || repo.timezone_for(store_id)).await?;
    let (tz, zone_warning) = resolve_timezone(timezone_raw.as_deref());
    if let Some(warning) = zone_warning {
        warnings.push(warning.to_string());
    }

    let schedule = with_retry("schedule_for", || repo.schedule_for(store_id)).await?;
    let polls = with_retry("polls_in_range", || {
        repo.polls_in_range(store_id, horizon.start, horizon.end)
    })
    .await?;

    let windows = business_windows(schedule.as_ref(), tz, horizon, &mut warnings);
    let (segments, invented) = build_status_segments(&polls, horizon);
    if invented {
        warnings.push(WARN_NO_POLLS.to_string());
    }

    let week = accumulate(&segments, &windows);
    let day_bounds = UtcSpan::new(now - TimeDelta::hours(24), now);
    let day = accumulate(&segments, &clip_windows(&windows, day_bounds));
    let hour_bounds = UtcSpan::new(now - TimeDelta::hours(1), now);
    let hour = accumulate(&segments, &clip_windows(&windows, hour_bounds));

    Ok(ReportRow {
        store_id: store_id.clone(),
        uptime_last_hour: round2(delta_to_minutes(hour.uptime)),
        uptime_last_day: round2(delta_to_hours(day.uptime)),
        uptime_last_week: round2(delta_to_hours(week.uptime)),
        downtime_last_hour: round2(delta_to_minutes(hour.downtime)),
        downtime_last_day: round2(delta_to_hours(day.downtime)),
        downtime_last_week: round2(delta_to_hours(week.downtime)),
        warnings,
    })
}
