//! Overlap accumulation between the status signal and business windows.
//!
//! The sweep walks the (sorted, disjoint) status segments once, scanning only
//! the business windows that can still intersect. Totals are accumulated as
//! exact `TimeDelta`s; no floating point enters until the reporting step.

use chrono::TimeDelta;

use crate::models::{PollStatus, UtcSpan};
use crate::services::status_signal::StatusSegment;

/// Accumulated uptime/downtime durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapTotals {
    pub uptime: TimeDelta,
    pub downtime: TimeDelta,
}

impl Default for OverlapTotals {
    fn default() -> Self {
        OverlapTotals {
            uptime: TimeDelta::zero(),
            downtime: TimeDelta::zero(),
        }
    }
}

/// Total duration of the intersection between each status segment and each
/// business window, classified by the segment's status.
///
/// Segments must be sorted and disjoint (the status-signal invariant);
/// windows may arrive in any order and are sorted internally.
pub fn accumulate(segments: &[StatusSegment], windows: &[UtcSpan]) -> OverlapTotals {
    let mut sorted: Vec<UtcSpan> = windows.to_vec();
    sorted.sort_by_key(|w| (w.start, w.end));

    let mut totals = OverlapTotals::default();
    let mut first_candidate = 0;

    for segment in segments {
        // Windows ending at or before this segment can never intersect a
        // later segment either.
        while first_candidate < sorted.len() && sorted[first_candidate].end <= segment.span.start {
            first_candidate += 1;
        }

        let mut index = first_candidate;
        while index < sorted.len() && sorted[index].start < segment.span.end {
            let overlap = segment.span.overlap_duration(&sorted[index]);
            if overlap > TimeDelta::zero() {
                match segment.status {
                    PollStatus::Active => totals.uptime += overlap,
                    PollStatus::Inactive => totals.downtime += overlap,
                }
            }
            index += 1;
        }
    }

    totals
}

/// Restrict business windows to a reporting interval, dropping windows that
/// fall entirely outside it.
pub fn clip_windows(windows: &[UtcSpan], bounds: UtcSpan) -> Vec<UtcSpan> {
    windows
        .iter()
        .filter_map(|window| window.intersect(&bounds))
        .collect()
}
