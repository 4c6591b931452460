//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Current server time (RFC 3339)
    pub timestamp: String,
    pub uptime_seconds: u64,
    /// Scores queued or running
    pub active_jobs: usize,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let uptime_seconds = now
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "remusic-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: remusic_common::time::to_rfc3339(now),
        uptime_seconds,
        active_jobs: state.jobs.active_count(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/health", get(health_check))
}
