//! Domain records for polls, schedules, and reports.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ReportId, StoreId};

/// Observed store state at a poll instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Inactive,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for PollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(PollStatus::Active),
            "inactive" => Ok(PollStatus::Inactive),
            other => Err(format!("unknown poll status: {other:?}")),
        }
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single status observation for a store, already normalized to UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub store_id: StoreId,
    pub timestamp: DateTime<Utc>,
    pub status: PollStatus,
}

/// Open/close times for one weekday, kept as the raw `HH:MM:SS` strings the
/// source table carries. Parsing happens during window materialization so a
/// malformed value skips that window instead of poisoning the whole schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub open: String,
    pub close: String,
}

/// Weekly business-hour plan in store-local time.
///
/// Keys are weekday indices with 0 = Monday. A missing day means the store is
/// closed that day. A store with no schedule at all never constructs one of
/// these; it is treated as always open by the window builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessSchedule {
    entries: BTreeMap<u8, ScheduleEntry>,
}

impl BusinessSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hours for a weekday (0 = Monday). At most one entry per day;
    /// a second insert for the same day replaces the first.
    pub fn set_day(&mut self, day_of_week: u8, open: impl Into<String>, close: impl Into<String>) {
        self.entries.insert(
            day_of_week,
            ScheduleEntry {
                open: open.into(),
                close: close.into(),
            },
        );
    }

    pub fn entry_for(&self, day_of_week: u8) -> Option<&ScheduleEntry> {
        self.entries.get(&day_of_week)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lifecycle state of a report record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Running,
    Complete,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Running => "Running",
            ReportStatus::Complete => "Complete",
            ReportStatus::Failed => "Failed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(ReportStatus::Running),
            "Complete" => Ok(ReportStatus::Complete),
            "Failed" => Ok(ReportStatus::Failed),
            other => Err(format!("unknown report status: {other:?}")),
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted report record. Created `Running`, transitioned exactly once to
/// `Complete` (with a CSV payload) or `Failed` (with a reason).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: ReportId,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub payload: Option<String>,
    pub error: Option<String>,
}
