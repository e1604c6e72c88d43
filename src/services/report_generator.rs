//! Report generation driver.
//!
//! Runs one report job end to end: create the report record, resolve the
//! reference instant and store universe, fan estimates out across a bounded
//! worker pool, and persist the CSV payload. Progress is mirrored to the job
//! tracker so clients can stream it while the job runs.
//!
//! This is the only place that touches wall-clock time (for the report's
//! `created_at`); all estimator math anchors on the data-derived `now`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::api::{ReportId, ReportRow};
use crate::db::repository::{FullRepository, RepositoryError};
use crate::db::services as db_services;
use crate::services::job_tracker::{JobTracker, LogLevel};
use crate::services::store_estimator::estimate_store;

/// Annotation attached to rows whose estimate missed the per-store deadline.
pub const WARN_TIMEOUT: &str = "timeout";

/// Fixed CSV header; column order is part of the payload contract.
pub const CSV_HEADER: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "uptime_last_day",
    "uptime_last_week",
    "downtime_last_hour",
    "downtime_last_day",
    "downtime_last_week",
];

/// Tuning knobs for the report driver.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Bounded worker pool size for per-store estimation.
    pub worker_count: usize,
    /// Deadline for a single store's estimate.
    pub store_deadline: Duration,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            store_deadline: Duration::from_secs(30),
        }
    }
}

impl ReportSettings {
    /// Settings with env overrides (`REPORT_WORKERS`, `REPORT_STORE_DEADLINE_SECS`).
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(workers) = std::env::var("REPORT_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            settings.worker_count = workers;
        }
        if let Some(secs) = std::env::var("REPORT_STORE_DEADLINE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            settings.store_deadline = Duration::from_secs(secs);
        }
        settings
    }
}

/// Render report rows as the CSV payload: fixed header, rows pre-sorted by
/// store id, two-decimal values, `\n` terminators.
pub fn render_csv(rows: &[ReportRow]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.store_id.value().to_string(),
            format!("{:.2}", row.uptime_last_hour),
            format!("{:.2}", row.uptime_last_day),
            format!("{:.2}", row.uptime_last_week),
            format!("{:.2}", row.downtime_last_hour),
            format!("{:.2}", row.downtime_last_day),
            format!("{:.2}", row.downtime_last_week),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv flush failed: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

/// Run a report job to completion, transitioning the report record to
/// `Failed` on any error (including cancellation).
///
/// Designed to be spawned as a background task; progress goes to the tracker.
pub async fn run_report_job(
    repo: Arc<dyn FullRepository>,
    tracker: JobTracker,
    report_id: ReportId,
    settings: ReportSettings,
) -> Result<usize, String> {
    info!(report_id = %report_id, "report generation task started");
    match generate_report(&repo, &tracker, &report_id, &settings).await {
        Ok(row_count) => {
            info!(report_id = %report_id, row_count, "report complete");
            Ok(row_count)
        }
        Err(reason) => {
            if let Err(e) = repo.fail_report(&report_id, &reason).await {
                error!(report_id = %report_id, "could not record report failure: {}", e);
            }
            tracker.fail_job(report_id.value(), &reason);
            error!(report_id = %report_id, "report failed: {}", reason);
            Err(reason)
        }
    }
}

async fn generate_report(
    repo: &Arc<dyn FullRepository>,
    tracker: &JobTracker,
    report_id: &ReportId,
    settings: &ReportSettings,
) -> Result<usize, String> {
    tracker.log(
        report_id.value(),
        LogLevel::Info,
        "Starting report generation...",
    );
    repo.create_report(report_id, Utc::now())
        .await
        .map_err(|e| e.to_string())?;

    let now = db_services::resolve_reference_instant(repo.as_ref())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound { .. } => "no poll data to report on".to_string(),
            other => other.to_string(),
        })?;

    let universe = db_services::resolve_store_universe(repo.as_ref())
        .await
        .map_err(|e| e.to_string())?;
    tracker.log(
        report_id.value(),
        LogLevel::Info,
        format!("Found {} unique stores to process.", universe.len()),
    );

    let semaphore = Arc::new(Semaphore::new(settings.worker_count.max(1)));
    let mut join_set = JoinSet::new();

    for store_id in universe {
        // No new estimates are dispatched once cancellation is requested.
        if tracker.is_cancelled(report_id.value()) {
            break;
        }
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| e.to_string())?;
        let repo = Arc::clone(repo);
        let deadline = settings.store_deadline;
        join_set.spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(deadline, estimate_store(repo.as_ref(), &store_id, now))
                .await
            {
                Ok(Ok(row)) => row,
                Ok(Err(e)) => {
                    warn!(store_id = %store_id, "store estimate failed: {}", e);
                    ReportRow::empty_with_warning(store_id, format!("failed: {}", e))
                }
                Err(_) => {
                    warn!(store_id = %store_id, "store estimate missed its deadline");
                    ReportRow::empty_with_warning(store_id, WARN_TIMEOUT)
                }
            }
        });
    }

    let total = join_set.len();
    let mut rows: Vec<ReportRow> = Vec::with_capacity(total);
    let mut processed = 0usize;

    while let Some(joined) = join_set.join_next().await {
        if tracker.is_cancelled(report_id.value()) {
            // Partial results are discarded; outstanding workers observe the
            // abort at their next suspension point.
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
            return Err("cancelled".to_string());
        }
        match joined {
            Ok(row) => {
                processed += 1;
                tracker.log(
                    report_id.value(),
                    LogLevel::Info,
                    format!("({}/{}) processed store {}", processed, total, row.store_id),
                );
                if !row.warnings.is_empty() {
                    tracker.log(
                        report_id.value(),
                        LogLevel::Warning,
                        format!("store {}: {}", row.store_id, row.warnings.join(", ")),
                    );
                }
                rows.push(row);
            }
            Err(join_error) if join_error.is_cancelled() => {}
            Err(join_error) => return Err(format!("worker panicked: {}", join_error)),
        }
    }

    if tracker.is_cancelled(report_id.value()) {
        return Err("cancelled".to_string());
    }

    // Byte-identical payloads for byte-identical inputs.
    rows.sort_by(|a, b| a.store_id.value().cmp(b.store_id.value()));

    let payload = render_csv(&rows).map_err(|e| e.to_string())?;
    repo.complete_report(report_id, payload)
        .await
        .map_err(|e| e.to_string())?;

    let row_count = rows.len();
    tracker.log(
        report_id.value(),
        LogLevel::Success,
        format!("Report complete with {} rows.", row_count),
    );
    tracker.complete_job(
        report_id.value(),
        Some(serde_json::json!({ "rows": row_count })),
    );
    Ok(row_count)
}
