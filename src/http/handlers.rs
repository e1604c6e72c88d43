//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use super::dto::{
    CancelReportResponse, HealthResponse, JobStatusResponse, ReportQuery, TriggerReportResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::ReportId;
use crate::db::services as db_services;
use crate::models::ReportStatus;
use crate::services::report_generator;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the database is
/// accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Report Generation
// =============================================================================

/// POST /trigger-report
///
/// Start asynchronous report generation. Returns the report id immediately;
/// generation runs in the background.
pub async fn trigger_report(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerReportResponse>), AppError> {
    let report_id = ReportId::generate();
    state.job_tracker.create_job(report_id.value());

    let repo = Arc::clone(&state.repository);
    let tracker = state.job_tracker.clone();
    let settings = state.settings.clone();
    let job_report_id = report_id.clone();
    tokio::spawn(async move {
        let _ = report_generator::run_report_job(repo, tracker, job_report_id, settings).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerReportResponse {
            report_id: report_id.value().to_string(),
            message: format!(
                "Report generation started. Poll /get-report/{} for the result.",
                report_id
            ),
        }),
    ))
}

/// GET /get-report/{report_id}?format=csv|json
///
/// Return the report status, or the payload once complete: a downloadable
/// CSV by default, or the rows as JSON with `?format=json`.
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let report_id = ReportId::new(report_id);
    let report = state
        .repository
        .lookup_report(&report_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Report ID not found.".to_string()))?;

    match report.status {
        ReportStatus::Running => {
            Ok(Json(serde_json::json!({ "status": "Running" })).into_response())
        }
        ReportStatus::Failed => Ok(Json(serde_json::json!({
            "status": "Failed",
            "reason": report.error,
        }))
        .into_response()),
        ReportStatus::Complete => {
            let payload = report.payload.unwrap_or_default();
            match query.format.as_deref().unwrap_or("csv") {
                "json" => {
                    let records = csv_to_json(&payload)
                        .map_err(|e| AppError::Internal(format!("payload parse error: {}", e)))?;
                    Ok(Json(records).into_response())
                }
                "csv" => Ok((
                    [
                        (header::CONTENT_TYPE, "text/csv".to_string()),
                        (
                            header::CONTENT_DISPOSITION,
                            format!("attachment; filename=report_{}.csv", report_id),
                        ),
                    ],
                    payload,
                )
                    .into_response()),
                other => Err(AppError::BadRequest(format!(
                    "unknown format {:?}; expected csv or json",
                    other
                ))),
            }
        }
    }
}

/// Parse a CSV payload back into JSON records, one object per row with the
/// header fields as keys.
fn csv_to_json(payload: &str) -> Result<Vec<serde_json::Value>, csv::Error> {
    let mut reader = csv::Reader::from_reader(payload.as_bytes());
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut object = serde_json::Map::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            object.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
        records.push(serde_json::Value::Object(object));
    }
    Ok(records)
}

// =============================================================================
// Async Job Management
// =============================================================================

/// GET /v1/reports/{report_id}
///
/// Get the current status and progress logs of a report job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .job_tracker
        .get_job(&report_id)
        .ok_or_else(|| AppError::NotFound(format!("Report job {} not found", report_id)))?;

    Ok(Json(JobStatusResponse {
        report_id: job.job_id,
        status: format!("{:?}", job.status).to_lowercase(),
        logs: job.logs,
        result: job.result,
    }))
}

/// POST /v1/reports/{report_id}/cancel
///
/// Request cancellation of a running report job. The report record transitions
/// to `Failed(reason="cancelled")` once the driver observes the request.
pub async fn cancel_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<(StatusCode, Json<CancelReportResponse>), AppError> {
    if state.job_tracker.get_job(&report_id).is_none() {
        return Err(AppError::NotFound(format!(
            "Report job {} not found",
            report_id
        )));
    }
    let cancelling = state.job_tracker.request_cancel(&report_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelReportResponse {
            report_id,
            cancelling,
        }),
    ))
}

/// GET /v1/reports/{report_id}/logs
///
/// Stream report job logs via Server-Sent Events (SSE).
pub async fn stream_job_logs(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Verify job exists
    if state.job_tracker.get_job(&report_id).is_none() {
        return Err(AppError::NotFound(format!(
            "Report job {} not found",
            report_id
        )));
    }

    let tracker = state.job_tracker.clone();
    let stream = async_stream::stream! {
        let mut last_log_count = 0;
        loop {
            // Send new logs since last check
            let logs = tracker.get_logs(&report_id);
            for log in logs.iter().skip(last_log_count) {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }
            last_log_count = logs.len();

            // Check if the job is complete
            if let Some(job) = tracker.get_job(&report_id) {
                if job.status != crate::services::job_tracker::JobStatus::Running {
                    let final_event = serde_json::json!({
                        "status": job.status,
                        "result": job.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
            } else {
                break;
            }

            // Wait before checking again
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}
