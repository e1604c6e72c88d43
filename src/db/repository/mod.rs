//! Repository traits: the typed contract between the estimator core and the
//! persistence layer.
//!
//! The core consumes read operations over polls, schedules, and timezones,
//! plus write operations for report records. Implementations live in
//! `db::repositories` and must be `Send + Sync` to work with async Rust.

pub mod error;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{ReportId, StoreId};
use crate::models::{BusinessSchedule, Poll, Report};

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// Read operations over the three source tables.
#[async_trait]
pub trait StoreDataRepository: Send + Sync {
    /// Distinct store ids appearing in the poll table.
    async fn store_ids_with_polls(&self) -> RepositoryResult<BTreeSet<StoreId>>;

    /// Distinct store ids appearing in the business-hours table.
    async fn store_ids_with_schedules(&self) -> RepositoryResult<BTreeSet<StoreId>>;

    /// Distinct store ids appearing in the timezone table.
    async fn store_ids_with_timezones(&self) -> RepositoryResult<BTreeSet<StoreId>>;

    /// Maximum poll timestamp across the whole data set, used as the
    /// reference instant for report generation.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` when the poll table is empty.
    async fn max_poll_timestamp(&self) -> RepositoryResult<DateTime<Utc>>;

    /// Polls for one store within `[start, end]` (inclusive on both bounds),
    /// ordered by timestamp ascending.
    async fn polls_in_range(
        &self,
        store_id: &StoreId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Poll>>;

    /// IANA timezone identifier for a store, if one is recorded.
    async fn timezone_for(&self, store_id: &StoreId) -> RepositoryResult<Option<String>>;

    /// Weekly business-hour schedule for a store, if any rows exist.
    async fn schedule_for(&self, store_id: &StoreId) -> RepositoryResult<Option<BusinessSchedule>>;
}

/// Write and lookup operations for report records.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Insert a new report record in `Running` state.
    ///
    /// # Returns
    /// * `Err(RepositoryError::ValidationError)` when the id already exists.
    async fn create_report(
        &self,
        report_id: &ReportId,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// Transition a `Running` report to `Complete` with its CSV payload.
    async fn complete_report(&self, report_id: &ReportId, payload: String)
        -> RepositoryResult<()>;

    /// Transition a `Running` report to `Failed` with an error description.
    async fn fail_report(&self, report_id: &ReportId, reason: &str) -> RepositoryResult<()>;

    /// Fetch a report record. `Ok(None)` when no record exists; the HTTP
    /// layer synthesizes the `NotFound` status from that.
    async fn lookup_report(&self, report_id: &ReportId) -> RepositoryResult<Option<Report>>;
}

/// Combined repository interface used by the report driver.
#[async_trait]
pub trait FullRepository: StoreDataRepository + ReportRepository {
    /// Verify the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;
}
