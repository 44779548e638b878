//! Session state evaluator
//!
//! Decides, for one incoming transcript line, what happens to the interview
//! it belongs to. `decide` is pure: it sees the stored record (if any), the
//! request and the current instant, and never touches the store or the
//! wall clock. `evaluate` wraps it with the lookup inside the caller's
//! transaction.
//!
//! Order of checks for an interview that is still in progress:
//! 1. timeout (`now > window_end + grace`)
//! 2. idle gap between the two participants' last responses
//! 3. otherwise ongoing
//!
//! Timeout wins when both completion conditions hold.

use chrono::{DateTime, Duration, Utc};
use ivts_common::config::SessionConfig;
use ivts_common::db::{Interview, InterviewStatus, ScheduledWindow, SpeakerRole};
use ivts_common::time::abs_diff;
use ivts_common::{Error, Result};

use crate::db::InterviewTransaction;

/// Thresholds applied by the evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRules {
    /// Time allowed past `window_end` before the interview times out
    pub completion_grace: Duration,
    /// Largest tolerated gap between candidate and panel responses
    pub idle_gap_limit: Duration,
    /// Store the line that triggered completion (insert-then-complete)
    pub record_completion_line: bool,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionRules {
    fn from(config: &SessionConfig) -> Self {
        Self {
            completion_grace: config.completion_grace(),
            idle_gap_limit: config.idle_gap_limit(),
            record_completion_line: config.record_completion_line,
        }
    }
}

/// Input to one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub interview_id: String,
    pub role: SpeakerRole,
    /// Required only when the interview does not exist yet
    pub window: Option<ScheduledWindow>,
    /// Status the caller wants applied when the interview is ongoing
    pub requested_status: InterviewStatus,
}

/// Why a write was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyFinalized(InterviewStatus),
}

/// Outcome of evaluating one transcript write
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// First line for this interview: create the record, then insert
    CreateAndInsert { interview: Interview },
    /// Ongoing: bump the role's last response, apply the status, insert
    UpdateAndInsert {
        role: SpeakerRole,
        responded_at: DateTime<Utc>,
        status: InterviewStatus,
    },
    /// `now` passed `window_end + grace`
    CompletedByTimeout { deadline: DateTime<Utc> },
    /// Participants' last responses are too far apart
    CompletedByIdleGap { gap: Duration },
    /// No writes happen
    Rejected { reason: RejectReason },
}

impl Decision {
    /// Stable name used in logs and API responses
    pub fn action(&self) -> &'static str {
        match self {
            Decision::CreateAndInsert { .. } => "created",
            Decision::UpdateAndInsert { .. } => "updated",
            Decision::CompletedByTimeout { .. } => "completed_by_timeout",
            Decision::CompletedByIdleGap { .. } => "completed_by_idle_gap",
            Decision::Rejected { .. } => "rejected",
        }
    }

    /// Interview status once the decision has been applied
    pub fn resulting_status(&self) -> InterviewStatus {
        match self {
            Decision::CreateAndInsert { interview } => interview.status,
            Decision::UpdateAndInsert { status, .. } => *status,
            Decision::CompletedByTimeout { .. } | Decision::CompletedByIdleGap { .. } => {
                InterviewStatus::Completed
            }
            Decision::Rejected {
                reason: RejectReason::AlreadyFinalized(status),
            } => *status,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Decision::CompletedByTimeout { .. } | Decision::CompletedByIdleGap { .. }
        )
    }
}

fn validate(request: &EvaluationRequest) -> Result<()> {
    if request.interview_id.trim().is_empty() {
        return Err(Error::InvalidInput("interview id must not be empty".to_string()));
    }
    if !request.role.is_participant() {
        return Err(Error::InvalidInput(format!(
            "role must be candidate or panel, got {}",
            request.role
        )));
    }
    if request.requested_status == InterviewStatus::Processed {
        return Err(Error::InvalidInput(
            "processed is set by the finalization sweep, not by callers".to_string(),
        ));
    }
    Ok(())
}

/// Pure decision for one transcript write
pub fn decide(
    existing: Option<&Interview>,
    request: &EvaluationRequest,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Result<Decision> {
    validate(request)?;

    let interview = match existing {
        None => {
            let window = request.window.ok_or_else(|| {
                Error::InvalidInput(format!(
                    "interview {} does not exist yet; window_start and window_end are required",
                    request.interview_id
                ))
            })?;

            let mut interview = Interview {
                id: request.interview_id.clone(),
                window_start: window.start,
                window_end: window.end,
                candidate_last_response_at: None,
                panel_last_response_at: None,
                started_at: now,
                started_by: request.role,
                status: InterviewStatus::InProgress,
                updated_at: now,
            };
            match request.role {
                SpeakerRole::Candidate => interview.candidate_last_response_at = Some(now),
                SpeakerRole::Panel => interview.panel_last_response_at = Some(now),
                SpeakerRole::Ai => {}
            }

            return Ok(Decision::CreateAndInsert { interview });
        }
        Some(interview) => interview,
    };

    if interview.status.is_finalized() {
        return Ok(Decision::Rejected {
            reason: RejectReason::AlreadyFinalized(interview.status),
        });
    }

    // A deadline past the representable range never arrives
    if let Some(deadline) = interview.window_end.checked_add_signed(rules.completion_grace) {
        if now > deadline {
            return Ok(Decision::CompletedByTimeout { deadline });
        }
    }

    if let (Some(candidate), Some(panel)) = (
        interview.last_response_of(SpeakerRole::Candidate),
        interview.last_response_of(SpeakerRole::Panel),
    ) {
        let gap = abs_diff(candidate, panel);
        if gap > rules.idle_gap_limit {
            return Ok(Decision::CompletedByIdleGap { gap });
        }
    }

    Ok(Decision::UpdateAndInsert {
        role: request.role,
        responded_at: now,
        status: request.requested_status,
    })
}

/// Look up the interview on `tx` and decide
pub async fn evaluate(
    tx: &mut dyn InterviewTransaction,
    request: &EvaluationRequest,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Result<Decision> {
    validate(request)?;
    let existing = tx.find(&request.interview_id).await?;
    decide(existing.as_ref(), request, now, rules)
}
