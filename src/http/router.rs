//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Job management endpoints, versioned
    let api_v1 = Router::new()
        .route("/reports/{report_id}", get(handlers::get_job_status))
        .route("/reports/{report_id}/logs", get(handlers::stream_job_logs))
        .route("/reports/{report_id}/cancel", post(handlers::cancel_report));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/trigger-report", post(handlers::trigger_report))
        .route("/get-report/{report_id}", get(handlers::get_report))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
