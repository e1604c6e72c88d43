//! Status signal reconstruction.
//!
//! Turns a store's sparse poll sequence into a piecewise-constant signal over
//! the reference horizon: contiguous half-open segments, each carrying one
//! status. The earliest observed status is carried back across the unobserved
//! prefix; each poll's status holds until the next poll; the last poll's
//! status holds until `now`.

use crate::models::{Poll, PollStatus, UtcSpan};

/// Annotation for stores whose signal had to be invented outright.
pub const WARN_NO_POLLS: &str = "no_polls";

/// A half-open UTC interval tagged with a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSegment {
    pub span: UtcSpan,
    pub status: PollStatus,
}

/// Build the status segments for one store over `horizon`.
///
/// `polls` must be ordered ascending (the repository contract) and restricted
/// to the horizon's inclusive bounds. Duplicate timestamps retain the first
/// poll; zero-length segments are dropped.
///
/// Returns the segments and whether the signal was invented (empty poll
/// sequence, the only case where the estimator assumes `active` with no
/// observation at all).
pub fn build_status_segments(polls: &[Poll], horizon: UtcSpan) -> (Vec<StatusSegment>, bool) {
    if horizon.is_empty() {
        return (Vec::new(), polls.is_empty());
    }
    if polls.is_empty() {
        return (
            vec![StatusSegment {
                span: horizon,
                status: PollStatus::Active,
            }],
            true,
        );
    }

    debug_assert!(polls.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // Duplicate timestamps retain the first poll by input order.
    let mut deduped: Vec<&Poll> = Vec::with_capacity(polls.len());
    for poll in polls {
        if deduped
            .last()
            .map_or(true, |prev| prev.timestamp != poll.timestamp)
        {
            deduped.push(poll);
        }
    }

    let mut segments = Vec::with_capacity(deduped.len() + 1);
    let mut cursor = horizon.start;
    // Carry-back: the first observed status covers the unobserved prefix.
    let mut status = deduped[0].status;

    for poll in deduped {
        let boundary = poll.timestamp.clamp(horizon.start, horizon.end);
        if boundary > cursor {
            segments.push(StatusSegment {
                span: UtcSpan::new(cursor, boundary),
                status,
            });
            cursor = boundary;
        }
        status = poll.status;
    }

    if horizon.end > cursor {
        segments.push(StatusSegment {
            span: UtcSpan::new(cursor, horizon.end),
            status,
        });
    }

    (segments, false)
}
