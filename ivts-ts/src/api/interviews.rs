//! Interview and transcript API handlers
//!
//! POST /interviews/:id/transcript, GET /interviews/:id,
//! GET /interviews/:id/conversation, DELETE /interviews/:id

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ivts_common::db::{Interview, InterviewStatus, ScheduledWindow, SpeakerRole, TranscriptLine};
use ivts_common::Error;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::session::{Decision, SubmissionOutcome, TranscriptSubmission};
use crate::AppState;

/// POST /interviews/:id/transcript request
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub name: String,
    pub role: String,
    #[serde(alias = "transcript")]
    pub text: String,
    /// Requested status; defaults to in_progress
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "from_time")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, alias = "to_time")]
    pub window_end: Option<DateTime<Utc>>,
}

impl TranscriptRequest {
    fn window(&self) -> Result<Option<ScheduledWindow>, Error> {
        match (self.window_start, self.window_end) {
            (Some(start), Some(end)) => ScheduledWindow::new(start, end).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidInput(
                "window_start and window_end must be given together".to_string(),
            )),
        }
    }
}

/// POST /interviews/:id/transcript response
#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub interview_id: String,
    pub action: &'static str,
    pub status: InterviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<TranscriptLine>,
}

impl From<SubmissionOutcome> for TranscriptResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        Self {
            interview_id: outcome.interview_id,
            action: outcome.action,
            status: outcome.status,
            line: outcome.line,
        }
    }
}

/// DELETE /interviews/:id response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub interview_id: String,
    pub deleted_rows: u64,
}

fn status_code_for(decision: &Decision) -> StatusCode {
    match decision {
        Decision::CreateAndInsert { .. } => StatusCode::CREATED,
        Decision::Rejected { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    }
}

/// POST /interviews/:id/transcript
///
/// Candidate and panel lines go through the session evaluator. AI lines are
/// appended to an interview that is already in progress.
pub async fn submit_transcript(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TranscriptResponse>)> {
    let Json(request) = payload?;
    let role: SpeakerRole = request.role.parse()?;

    if role == SpeakerRole::Ai {
        let line = state
            .writer
            .record_ai_line(&interview_id, &request.name, &request.text)
            .await?;
        return Ok((
            StatusCode::CREATED,
            Json(TranscriptResponse {
                interview_id,
                action: "recorded",
                status: InterviewStatus::InProgress,
                line: Some(line),
            }),
        ));
    }

    let requested_status = match request.status.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<InterviewStatus>()?,
        _ => InterviewStatus::InProgress,
    };
    let window = request.window()?;

    let outcome = state
        .writer
        .submit(TranscriptSubmission {
            interview_id,
            speaker_name: request.name,
            role,
            text: request.text,
            window,
            requested_status,
        })
        .await?;

    let status = status_code_for(&outcome.decision);
    Ok((status, Json(outcome.into())))
}

/// GET /interviews/:id
pub async fn get_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> ApiResult<Json<Interview>> {
    let interview = state
        .store
        .find(&interview_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Interview {}", interview_id)))?;
    Ok(Json(interview))
}

/// GET /interviews/:id/conversation
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> ApiResult<Json<Vec<TranscriptLine>>> {
    if state.store.find(&interview_id).await?.is_none() {
        return Err(ApiError::from(Error::NotFound(format!(
            "Interview {}",
            interview_id
        ))));
    }
    Ok(Json(state.store.list_conversation(&interview_id).await?))
}

/// DELETE /interviews/:id
pub async fn delete_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted_rows = state.writer.delete_interview(&interview_id).await?;
    if deleted_rows == 0 {
        return Err(ApiError::from(Error::NotFound(format!(
            "Interview {}",
            interview_id
        ))));
    }

    tracing::info!(interview_id = %interview_id, deleted_rows, "Interview deleted");
    Ok(Json(DeleteResponse {
        interview_id,
        deleted_rows,
    }))
}

pub fn interview_routes() -> Router<AppState> {
    Router::new()
        .route("/interviews/:id", get(get_interview).delete(delete_interview))
        .route("/interviews/:id/transcript", post(submit_transcript))
        .route("/interviews/:id/conversation", get(get_conversation))
}
