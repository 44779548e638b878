//! On-demand finalization sweep

use axum::{extract::State, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::sweep::SweepReport;
use crate::AppState;

/// POST /sweep/run
///
/// Runs one pass immediately, regardless of the background schedule.
pub async fn run_sweep(State(state): State<AppState>) -> ApiResult<Json<SweepReport>> {
    let report = state.sweep.run_once().await?;
    Ok(Json(report))
}

pub fn sweep_routes() -> Router<AppState> {
    Router::new().route("/sweep/run", post(run_sweep))
}
