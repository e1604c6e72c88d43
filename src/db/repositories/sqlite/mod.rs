//! SQLite repository implementation backed by sqlx.
//!
//! The source tables keep timestamps as TEXT in two encodings (ISO-8601 and a
//! trailing ` UTC` literal), so range filtering and the max-timestamp scan
//! happen in Rust after parsing rather than by string comparison in SQL.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::warn;

use crate::api::{ReportId, StoreId};
use crate::db::repository::{
    ErrorContext, FullRepository, ReportRepository, RepositoryError, RepositoryResult,
    StoreDataRepository,
};
use crate::models::{
    parse_utc_timestamp, BusinessSchedule, Poll, PollStatus, Report, ReportStatus,
};

/// SQLite connection configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Connection URL, e.g. `sqlite://stores.db`
    pub database_url: String,
    pub max_connections: u32,
}

impl SqliteConfig {
    /// Build configuration from the `DATABASE_URL` environment variable.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL is not set".to_string())?;
        Ok(Self {
            database_url,
            max_connections: 5,
        })
    }
}

/// Repository over a SQLite database.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect using a configuration and create missing tables.
    pub async fn connect(config: &SqliteConfig) -> RepositoryResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| {
                RepositoryError::configuration(format!("invalid DATABASE_URL: {}", e))
            })?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    /// Connect to a database file path directly (loader, tests).
    pub async fn connect_file(path: &Path) -> RepositoryResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    /// Create the source and report tables when absent.
    pub async fn ensure_schema(&self) -> RepositoryResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS store_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT,
                status TEXT NOT NULL,
                timestamp_utc TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_store_status_store_id
                ON store_status (store_id)",
            "CREATE TABLE IF NOT EXISTS business_hours (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT,
                day_of_week INTEGER NOT NULL,
                start_time_local TEXT NOT NULL,
                end_time_local TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_business_hours_store_id
                ON business_hours (store_id)",
            "CREATE TABLE IF NOT EXISTS timezones (
                store_id TEXT PRIMARY KEY,
                timezone_str TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS store_report (
                report_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                report_data TEXT,
                error TEXT,
                created_at TEXT NOT NULL
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn distinct_store_ids(&self, table: &str) -> RepositoryResult<BTreeSet<StoreId>> {
        let sql = format!("SELECT DISTINCT store_id FROM {table} WHERE store_id IS NOT NULL");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(StoreId::new(row.try_get::<String, _>("store_id")?));
        }
        Ok(ids)
    }

    // ==================== Bulk ingestion (data loader) ====================

    /// Append poll rows; values are stored verbatim.
    pub async fn insert_status_rows(
        &self,
        rows: &[(String, String, String)],
    ) -> RepositoryResult<usize> {
        let mut tx = self.pool.begin().await?;
        for (store_id, status, timestamp_utc) in rows {
            sqlx::query("INSERT INTO store_status (store_id, status, timestamp_utc) VALUES (?, ?, ?)")
                .bind(store_id)
                .bind(status)
                .bind(timestamp_utc)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Append business-hour rows.
    pub async fn insert_business_hours_rows(
        &self,
        rows: &[(String, i64, String, String)],
    ) -> RepositoryResult<usize> {
        let mut tx = self.pool.begin().await?;
        for (store_id, day_of_week, start_time_local, end_time_local) in rows {
            sqlx::query(
                "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(store_id)
            .bind(day_of_week)
            .bind(start_time_local)
            .bind(end_time_local)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Upsert timezone rows (store_id is the primary key).
    pub async fn insert_timezone_rows(&self, rows: &[(String, String)]) -> RepositoryResult<usize> {
        let mut tx = self.pool.begin().await?;
        for (store_id, timezone_str) in rows {
            sqlx::query(
                "INSERT INTO timezones (store_id, timezone_str) VALUES (?, ?)
                 ON CONFLICT (store_id) DO UPDATE SET timezone_str = excluded.timezone_str",
            )
            .bind(store_id)
            .bind(timezone_str)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl StoreDataRepository for SqliteRepository {
    async fn store_ids_with_polls(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        self.distinct_store_ids("store_status").await
    }

    async fn store_ids_with_schedules(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        self.distinct_store_ids("business_hours").await
    }

    async fn store_ids_with_timezones(&self) -> RepositoryResult<BTreeSet<StoreId>> {
        self.distinct_store_ids("timezones").await
    }

    async fn max_poll_timestamp(&self) -> RepositoryResult<DateTime<Utc>> {
        let rows = sqlx::query("SELECT timestamp_utc FROM store_status")
            .fetch_all(&self.pool)
            .await?;
        let mut max: Option<DateTime<Utc>> = None;
        for row in rows {
            let raw: String = row.try_get("timestamp_utc")?;
            match parse_utc_timestamp(&raw) {
                Ok(ts) => max = Some(max.map_or(ts, |m| m.max(ts))),
                Err(e) => warn!("skipping unparseable poll timestamp: {}", e),
            }
        }
        max.ok_or_else(|| {
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
        let rows = sqlx::query(
            "SELECT status, timestamp_utc FROM store_status WHERE store_id = ?",
        )
        .bind(store_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_ts: String = row.try_get("timestamp_utc")?;
            let raw_status: String = row.try_get("status")?;
            let timestamp = match parse_utc_timestamp(&raw_ts) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(store_id = %store_id, "dropping poll row: {}", e);
                    continue;
                }
            };
            let status = match raw_status.parse::<PollStatus>() {
                Ok(status) => status,
                Err(e) => {
                    warn!(store_id = %store_id, "dropping poll row: {}", e);
                    continue;
                }
            };
            if timestamp >= start && timestamp <= end {
                polls.push(Poll {
                    store_id: store_id.clone(),
                    timestamp,
                    status,
                });
            }
        }
        polls.sort_by_key(|p| p.timestamp);
        Ok(polls)
    }

    async fn timezone_for(&self, store_id: &StoreId) -> RepositoryResult<Option<String>> {
        let row = sqlx::query("SELECT timezone_str FROM timezones WHERE store_id = ?")
            .bind(store_id.value())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<String, _>("timezone_str"))
            .transpose()
            .map_err(RepositoryError::from)
    }

    async fn schedule_for(&self, store_id: &StoreId) -> RepositoryResult<Option<BusinessSchedule>> {
        let rows = sqlx::query(
            "SELECT day_of_week, start_time_local, end_time_local
             FROM business_hours WHERE store_id = ?",
        )
        .bind(store_id.value())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let mut schedule = BusinessSchedule::new();
        for row in rows {
            let day: i64 = row.try_get("day_of_week")?;
            if !(0..=6).contains(&day) {
                warn!(store_id = %store_id, day, "dropping schedule row with invalid weekday");
                continue;
            }
            let open: String = row.try_get("start_time_local")?;
            let close: String = row.try_get("end_time_local")?;
            schedule.set_day(day as u8, open, close);
        }
        if schedule.is_empty() {
            return Ok(None);
        }
        Ok(Some(schedule))
    }
}

#[async_trait]
impl ReportRepository for SqliteRepository {
    async fn create_report(
        &self,
        report_id: &ReportId,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO store_report (report_id, status, created_at) VALUES (?, ?, ?)",
        )
        .bind(report_id.value())
        .bind(ReportStatus::Running.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::validation_with_context(
                "report id already exists",
                ErrorContext::new("create_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            ));
        }
        Ok(())
    }

    async fn complete_report(
        &self,
        report_id: &ReportId,
        payload: String,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE store_report SET status = ?, report_data = ? WHERE report_id = ? AND status = ?",
        )
        .bind(ReportStatus::Complete.as_str())
        .bind(payload)
        .bind(report_id.value())
        .bind(ReportStatus::Running.as_str())
        .execute(&self.pool)
        .await?;
        self.check_transition(report_id, result.rows_affected()).await
    }

    async fn fail_report(&self, report_id: &ReportId, reason: &str) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE store_report SET status = ?, error = ? WHERE report_id = ? AND status = ?",
        )
        .bind(ReportStatus::Failed.as_str())
        .bind(reason)
        .bind(report_id.value())
        .bind(ReportStatus::Running.as_str())
        .execute(&self.pool)
        .await?;
        self.check_transition(report_id, result.rows_affected()).await
    }

    async fn lookup_report(&self, report_id: &ReportId) -> RepositoryResult<Option<Report>> {
        let row = sqlx::query(
            "SELECT report_id, status, report_data, error, created_at
             FROM store_report WHERE report_id = ?",
        )
        .bind(report_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status_raw: String = row.try_get("status")?;
        let status = status_raw
            .parse::<ReportStatus>()
            .map_err(RepositoryError::internal)?;
        let created_raw: String = row.try_get("created_at")?;
        let created_at = parse_utc_timestamp(&created_raw)
            .map_err(|e| RepositoryError::internal(e.to_string()))?;
        Ok(Some(Report {
            report_id: ReportId::new(row.try_get::<String, _>("report_id")?),
            status,
            created_at,
            payload: row.try_get("report_data")?,
            error: row.try_get("error")?,
        }))
    }
}

impl SqliteRepository {
    /// Distinguish "missing report" from "already terminal" after a guarded
    /// UPDATE touched no rows.
    async fn check_transition(
        &self,
        report_id: &ReportId,
        rows_affected: u64,
    ) -> RepositoryResult<()> {
        if rows_affected > 0 {
            return Ok(());
        }
        match self.lookup_report(report_id).await? {
            None => Err(RepositoryError::not_found_with_context(
                "report not found",
                ErrorContext::new("update_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            )),
            Some(report) => Err(RepositoryError::validation_with_context(
                format!("report already {}", report.status),
                ErrorContext::new("update_report")
                    .with_entity("store_report")
                    .with_entity_id(report_id),
            )),
        }
    }
}

#[async_trait]
impl FullRepository for SqliteRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_repo() -> (tempfile::TempDir, SqliteRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepository::connect_file(&dir.path().join("stores.db"))
            .await
            .unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn test_round_trip_polls_mixed_encodings() {
        let (_dir, repo) = temp_repo().await;
        repo.insert_status_rows(&[
            (
                "s1".to_string(),
                "active".to_string(),
                "2024-01-01 10:00:00.000000 UTC".to_string(),
            ),
            (
                "s1".to_string(),
                "inactive".to_string(),
                "2024-01-01T09:00:00Z".to_string(),
            ),
            (
                "s1".to_string(),
                "active".to_string(),
                "not a timestamp".to_string(),
            ),
        ])
        .await
        .unwrap();

        let start = parse_utc_timestamp("2024-01-01T00:00:00Z").unwrap();
        let end = parse_utc_timestamp("2024-01-02T00:00:00Z").unwrap();
        let polls = repo
            .polls_in_range(&StoreId::from("s1"), start, end)
            .await
            .unwrap();

        assert_eq!(polls.len(), 2);
        assert_eq!(polls[0].status, PollStatus::Inactive);
        assert_eq!(polls[1].status, PollStatus::Active);
        assert!(polls[0].timestamp < polls[1].timestamp);
    }

    #[tokio::test]
    async fn test_report_lifecycle() {
        let (_dir, repo) = temp_repo().await;
        let id = ReportId::new("r1");
        let created = parse_utc_timestamp("2024-01-01T00:00:00Z").unwrap();

        repo.create_report(&id, created).await.unwrap();
        assert!(repo.create_report(&id, created).await.is_err());

        repo.complete_report(&id, "store_id\n".to_string())
            .await
            .unwrap();
        let report = repo.lookup_report(&id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(report.payload.as_deref(), Some("store_id\n"));

        // Terminal reports cannot transition again.
        assert!(repo.fail_report(&id, "late").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_poll_table_is_not_found() {
        let (_dir, repo) = temp_repo().await;
        let err = repo.max_poll_timestamp().await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
