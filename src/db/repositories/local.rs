//! In-memory repository for unit testing and local development.
//!
//! All tables live behind a single `parking_lot::RwLock`; no lock is ever
//! held across an await point.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::api::{ReportId, StoreId};
use crate::db::repository::{
    ErrorContext, FullRepository, ReportRepository, RepositoryError, RepositoryResult,
    StoreDataRepository,
};
use crate::models::{BusinessSchedule, Poll, Report, ReportStatus};

#[derive(Default)]
struct LocalState {
    polls: HashMap<StoreId, Vec<Poll>>,
    schedules: HashMap<StoreId, BusinessSchedule>,
    timezones: HashMap<StoreId, String>,
    reports: HashMap<String, Report>,
}

/// In-memory implementation of the repository traits.
#[derive(Default)]
pub struct LocalRepository {
    state: RwLock<LocalState>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a poll, keeping the store's sequence ordered by timestamp.
    pub fn insert_poll(&self, poll: Poll) {
        let mut state = self.state.write();
        let polls = state.polls.entry(poll.store_id.clone()).or_default();
        let position = polls.partition_point(|p| p.timestamp <= poll.timestamp);
        polls.insert(position, poll);
    }

    pub fn insert_polls(&self, polls: impl IntoIterator<Item = Poll>) {
        for poll in polls {
            self.insert_poll(poll);
        }
    }

    pub fn set_schedule(&self, store_id: StoreId, schedule: BusinessSchedule) {
        self.state.write().schedules.insert(store_id, schedule);
    }

    pub fn set_timezone(&self, store_id: StoreId, timezone: impl Into<String>) {
        self.state.write().timezones.insert(store_id, timezone.into());
    }
}

#[async_trait]
impl StoreDataRepository for LocalRepository {
    async fn store_ids_with_polls(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        Ok(self.state.read().polls.keys().cloned().collect())
    }

    async fn store_ids_with_schedules(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        Ok(self.state.read().schedules.keys().cloned().collect())
    }

    async fn store_ids_with_timezones(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        Ok(self.state.read().timezones.keys().cloned().collect())
    }

    async fn max_poll_timestamp(&self) -> RepositoryResult<DateTime<Utc>> {
        self.state
            .read()
            .polls
            .values()
            .flat_map(|polls| polls.iter().map(|p| p.timestamp))
            .max()
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    "poll table is empty",
                    ErrorContext::new("max_poll_timestamp").with_entity("store_status"),
                )
            })
    }

    async fn polls_in_range(
        &self,
        store_id: &StoreId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Poll>> {
        let state = self.state.read();
        let polls = state
            .polls
            .get(store_id)
            .map(|polls| {
                polls
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(polls)
    }

    async fn timezone_for(&self, store_id: &StoreId) -> RepositoryResult<Option<String>> {
        Ok(self.state.read().timezones.get(store_id).cloned())
    }

    async fn schedule_for(&self, store_id: &StoreId) -> RepositoryResult<Option<BusinessSchedule>> {
        Ok(self.state.read().schedules.get(store_id).cloned())
    }
}

#[async_trait]
impl ReportRepository for LocalRepository {
    async fn create_report(
        &self,
        report_id: &ReportId,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write();
        if state.reports.contains_key(report_id.value()) {
            return Err(RepositoryError::validation_with_context(
                "report id already exists",
                ErrorContext::new("create_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            ));
        }
        state.reports.insert(
            report_id.value().to_string(),
            Report {
                report_id: report_id.clone(),
                status: ReportStatus::Running,
                created_at,
                payload: None,
                error: None,
            },
        );
        Ok(())
    }

    async fn complete_report(
        &self,
        report_id: &ReportId,
        payload: String,
    ) -> RepositoryResult<()> {
        self.transition(report_id, |report| {
            report.status = ReportStatus::Complete;
            report.payload = Some(payload);
        })
    }

    async fn fail_report(&self, report_id: &ReportId, reason: &str) -> RepositoryResult<()> {
        let reason = reason.to_string();
        self.transition(report_id, move |report| {
            report.status = ReportStatus::Failed;
            report.error = Some(reason);
        })
    }

    async fn lookup_report(&self, report_id: &ReportId) -> RepositoryResult<Option<Report>> {
        Ok(self.state.read().reports.get(report_id.value()).cloned())
    }
}

impl LocalRepository {
    /// Apply a terminal transition to a `Running` report.
    fn transition(
        &self,
        report_id: &ReportId,
        apply: impl FnOnce(&mut Report),
    ) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let report = state.reports.get_mut(report_id.value()).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                "report not found",
                ErrorContext::new("update_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            )
        })?;
        if report.status != ReportStatus::Running {
            return Err(RepositoryError::validation_with_context(
                format!("report already {}", report.status),
                ErrorContext::new("update_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            ));
        }
        apply(report);
        Ok(())
    }
}

#[async_trait]
impl FullRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}
