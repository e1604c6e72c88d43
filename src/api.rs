//! Public API surface for the store monitor backend.
//!
//! This file consolidates the identifier newtypes and the report row DTO.
//! All types derive Serialize/Deserialize for JSON serialization.

use serde::{Deserialize, Serialize};

/// Store identifier (opaque string key shared by all source tables).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreId(pub String);

/// Report identifier (UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl StoreId {
    pub fn new(value: impl Into<String>) -> Self {
        StoreId(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl ReportId {
    pub fn new(value: impl Into<String>) -> Self {
        ReportId(value.into())
    }

    /// Mint a fresh v4 UUID report id.
    pub fn generate() -> Self {
        ReportId(uuid::Uuid::new_v4().to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StoreId {
    fn from(value: &str) -> Self {
        StoreId(value.to_string())
    }
}

/// One row of the final report.
///
/// `uptime_last_hour`/`downtime_last_hour` are minutes; the four day/week
/// metrics are hours. All six values are rounded half-to-even to two decimal
/// places. `warnings` records per-store anomalies (`no_polls`, `unknown_zone`,
/// `timeout`, parse skips) and is surfaced through job logs, not the CSV
/// payload, whose header is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub store_id: StoreId,
    pub uptime_last_hour: f64,
    pub uptime_last_day: f64,
    pub uptime_last_week: f64,
    pub downtime_last_hour: f64,
    pub downtime_last_day: f64,
    pub downtime_last_week: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ReportRow {
    /// A zeroed row carrying only a warning, used when a store's estimate
    /// cannot be produced (deadline miss, exhausted retries).
    pub fn empty_with_warning(store_id: StoreId, warning: impl Into<String>) -> Self {
        ReportRow {
            store_id,
            uptime_last_hour: 0.0,
            uptime_last_day: 0.0,
            uptime_last_week: 0.0,
            downtime_last_hour: 0.0,
            downtime_last_day: 0.0,
            downtime_last_week: 0.0,
            warnings: vec![warning.into()],
        }
    }
}
