//! ivts-ts library - Interview Transcript Service
//!
//! Records interview utterances, decides when an interview is over and
//! archives finished conversations.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod session;
pub mod sweep;

pub use error::{ApiError, ApiResult};

use db::InterviewStore;
use session::TranscriptWriter;
use sweep::FinalizationSweep;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InterviewStore>,
    pub writer: Arc<TranscriptWriter>,
    pub sweep: Arc<FinalizationSweep>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        writer: Arc<TranscriptWriter>,
        sweep: Arc<FinalizationSweep>,
    ) -> Self {
        Self {
            store,
            writer,
            sweep,
            startup_time: ivts_common::time::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::interview_routes())
        .merge(api::sweep_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
