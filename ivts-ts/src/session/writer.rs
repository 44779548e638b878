//! Transcript writer
//!
//! Applies the evaluator's decision. One submission is one transaction:
//! the interview create/update and the transcript insert commit together,
//! and a rejected submission commits nothing.

use std::sync::Arc;

use ivts_common::db::{
    retry_on_lock, InterviewPatch, InterviewStatus, NewTranscriptLine, ScheduledWindow,
    SpeakerRole, TranscriptLine,
};
use ivts_common::{Clock, Error, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::evaluator::{evaluate, Decision, EvaluationRequest, SessionRules};
use super::locks::InterviewLocks;
use crate::db::InterviewStore;

/// One utterance submitted by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSubmission {
    pub interview_id: String,
    pub speaker_name: String,
    pub role: SpeakerRole,
    pub text: String,
    pub window: Option<ScheduledWindow>,
    pub requested_status: InterviewStatus,
}

impl TranscriptSubmission {
    fn request(&self) -> EvaluationRequest {
        EvaluationRequest {
            interview_id: self.interview_id.clone(),
            role: self.role,
            window: self.window,
            requested_status: self.requested_status,
        }
    }

    fn line_at(&self, now: chrono::DateTime<chrono::Utc>) -> NewTranscriptLine {
        NewTranscriptLine {
            interview_id: self.interview_id.clone(),
            speaker_name: self.speaker_name.trim().to_string(),
            speaker_role: self.role,
            text: self.text.clone(),
            created_at: now,
        }
    }
}

/// What a submission did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub interview_id: String,
    pub action: &'static str,
    pub status: InterviewStatus,
    /// Stored line, absent when rejected or discarded on completion
    pub line: Option<TranscriptLine>,
    #[serde(skip)]
    pub decision: Decision,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub struct TranscriptWriter {
    store: Arc<dyn InterviewStore>,
    clock: Arc<dyn Clock>,
    locks: InterviewLocks,
    rules: SessionRules,
    max_lock_wait_ms: u64,
}

impl TranscriptWriter {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        clock: Arc<dyn Clock>,
        rules: SessionRules,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            store,
            clock,
            locks: InterviewLocks::new(),
            rules,
            max_lock_wait_ms,
        }
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    /// Evaluate and apply one participant's transcript line
    pub async fn submit(&self, submission: TranscriptSubmission) -> Result<SubmissionOutcome> {
        require_text("speaker name", &submission.speaker_name)?;
        require_text("text", &submission.text)?;

        let _guard = self.locks.acquire(&submission.interview_id).await;

        let this = self;
        let submission = &submission;
        let outcome = retry_on_lock("submit_transcript", self.max_lock_wait_ms, move || {
            this.submit_once(submission)
        })
        .await?;

        info!(
            interview_id = %outcome.interview_id,
            role = %submission.role,
            action = outcome.action,
            status = %outcome.status,
            line_stored = outcome.line.is_some(),
            "Transcript submission applied"
        );

        Ok(outcome)
    }

    async fn submit_once(&self, submission: &TranscriptSubmission) -> Result<SubmissionOutcome> {
        let now = self.clock.now();
        let request = submission.request();

        let mut tx = self.store.begin().await?;
        let decision = evaluate(tx.as_mut(), &request, now, &self.rules).await?;
        debug!(interview_id = %request.interview_id, ?decision, "Evaluated submission");

        if matches!(decision, Decision::Rejected { .. }) {
            // Nothing to persist; dropping the transaction rolls it back
            return Ok(SubmissionOutcome {
                interview_id: request.interview_id,
                action: decision.action(),
                status: decision.resulting_status(),
                line: None,
                decision,
            });
        }

        let line = match &decision {
            Decision::CreateAndInsert { interview } => {
                tx.create(interview).await?;
                Some(tx.append_transcript(&submission.line_at(now)).await?)
            }
            Decision::UpdateAndInsert {
                role,
                responded_at,
                status,
            } => {
                let patch = InterviewPatch::default()
                    .responded(*role, *responded_at)
                    .with_status(*status)
                    .stamped(now);
                tx.update(&request.interview_id, &patch).await?;
                Some(tx.append_transcript(&submission.line_at(now)).await?)
            }
            Decision::CompletedByTimeout { .. } | Decision::CompletedByIdleGap { .. } => {
                let line = if self.rules.record_completion_line {
                    Some(tx.append_transcript(&submission.line_at(now)).await?)
                } else {
                    None
                };
                let patch = InterviewPatch::default()
                    .with_status(InterviewStatus::Completed)
                    .stamped(now);
                tx.update(&request.interview_id, &patch).await?;
                line
            }
            Decision::Rejected { .. } => None,
        };

        tx.commit().await?;

        Ok(SubmissionOutcome {
            interview_id: request.interview_id,
            action: decision.action(),
            status: decision.resulting_status(),
            line,
            decision,
        })
    }

    /// Record a line from the automated interviewer
    ///
    /// The interview must already exist and still be in progress. AI lines
    /// never touch participant timestamps or status.
    pub async fn record_ai_line(
        &self,
        interview_id: &str,
        speaker_name: &str,
        text: &str,
    ) -> Result<TranscriptLine> {
        require_text("interview id", interview_id)?;
        require_text("speaker name", speaker_name)?;
        require_text("text", text)?;

        let _guard = self.locks.acquire(interview_id).await;

        let this = self;
        let line = retry_on_lock("record_ai_line", self.max_lock_wait_ms, move || {
            this.record_ai_line_once(interview_id, speaker_name, text)
        })
        .await?;

        info!(interview_id, line_id = line.id, "AI transcript line recorded");
        Ok(line)
    }

    /// Delete an interview and all of its transcript lines
    ///
    /// Serialized with submissions for the same interview. Returns the number
    /// of rows removed; zero means there was nothing to delete.
    pub async fn delete_interview(&self, interview_id: &str) -> Result<u64> {
        let _guard = self.locks.acquire(interview_id).await;

        let store = self.store.as_ref();
        retry_on_lock("delete_interview", self.max_lock_wait_ms, move || {
            store.delete_all(interview_id)
        })
        .await
    }

    async fn record_ai_line_once(
        &self,
        interview_id: &str,
        speaker_name: &str,
        text: &str,
    ) -> Result<TranscriptLine> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let interview = tx
            .find(interview_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {}", interview_id)))?;
        if interview.status.is_finalized() {
            return Err(Error::AlreadyFinalized {
                interview_id: interview_id.to_string(),
                status: interview.status.to_string(),
            });
        }

        let line = tx
            .append_transcript(&NewTranscriptLine {
                interview_id: interview_id.to_string(),
                speaker_name: speaker_name.trim().to_string(),
                speaker_role: SpeakerRole::Ai,
                text: text.to_string(),
                created_at: now,
            })
            .await?;
        tx.commit().await?;

        Ok(line)
    }
}
