//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Build stamp captured by the build script
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub revision: &'static str,
    pub built_at: &'static str,
    pub profile: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            revision: env!("IVTS_GIT_REVISION"),
            built_at: env!("IVTS_BUILT_AT"),
            profile: env!("IVTS_BUILD_PROFILE"),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub build: BuildInfo,
    pub uptime_seconds: i64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = ivts_common::time::now() - state.startup_time;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "ivts-ts".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: BuildInfo::current(),
        uptime_seconds: uptime.num_seconds().max(0),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
