//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::review::SessionInfo;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (e.g., "ok", "degraded", "error")
    pub status: String,
    /// Module name ("tis-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short commit hash captured at build time
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Files currently waiting on a reviewer
    pub pending_reviews: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub review_sessions: Vec<SessionInfo>,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tis-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        uptime_seconds,
        pending_reviews: state.registry.pending_count(),
        review_sessions: state.registry.sessions(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
