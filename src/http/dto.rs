//! Data Transfer Objects for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::services::job_tracker::LogEntry;

/// Response for triggering a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerReportResponse {
    /// ID to poll with `/get-report/{report_id}`
    pub report_id: String,
    /// Message about the operation
    pub message: String,
}

/// Query parameters for the report download endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportQuery {
    /// Payload format: "csv" (default, downloadable) or "json"
    #[serde(default)]
    pub format: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Job status response with progress logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub report_id: String,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub result: Option<serde_json::Value>,
}

/// Response for a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReportResponse {
    pub report_id: String,
    /// Whether the job was still running and cancellation was requested
    pub cancelling: bool,
}
