//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interview lifecycle status
///
/// Only ever moves forward: in_progress → completed → processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InProgress,
    Completed,
    Processed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Processed => "processed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            InterviewStatus::InProgress => 0,
            InterviewStatus::Completed => 1,
            InterviewStatus::Processed => 2,
        }
    }

    /// True when `next` does not move the lifecycle backwards
    pub fn can_advance_to(&self, next: InterviewStatus) -> bool {
        next.rank() >= self.rank()
    }

    /// Completed or processed interviews accept no more transcript lines
    pub fn is_finalized(&self) -> bool {
        !matches!(self, InterviewStatus::InProgress)
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            // "inprogress" is what older clients send
            "in_progress" | "inprogress" => Ok(InterviewStatus::InProgress),
            "completed" => Ok(InterviewStatus::Completed),
            "processed" => Ok(InterviewStatus::Processed),
            other => Err(Error::InvalidInput(format!("Unknown interview status: {}", other))),
        }
    }
}

/// Who produced a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Candidate,
    Panel,
    /// Automated interviewer; never drives the lifecycle
    Ai,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Candidate => "candidate",
            SpeakerRole::Panel => "panel",
            SpeakerRole::Ai => "ai",
        }
    }

    /// Candidate and panel are the two participants whose responses are tracked
    pub fn is_participant(&self) -> bool {
        matches!(self, SpeakerRole::Candidate | SpeakerRole::Panel)
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakerRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(SpeakerRole::Candidate),
            "panel" => Ok(SpeakerRole::Panel),
            "ai" => Ok(SpeakerRole::Ai),
            other => Err(Error::InvalidInput(format!("Unknown speaker role: {}", other))),
        }
    }
}

/// Scheduled time bounds of an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduledWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "Scheduled window starts after it ends ({} > {})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}

/// One row of the `interviews` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub candidate_last_response_at: Option<DateTime<Utc>>,
    pub panel_last_response_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub started_by: SpeakerRole,
    pub status: InterviewStatus,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn last_response_of(&self, role: SpeakerRole) -> Option<DateTime<Utc>> {
        match role {
            SpeakerRole::Candidate => self.candidate_last_response_at,
            SpeakerRole::Panel => self.panel_last_response_at,
            SpeakerRole::Ai => None,
        }
    }

    /// Most recent of start and both participants' last responses
    pub fn last_activity(&self) -> DateTime<Utc> {
        [self.candidate_last_response_at, self.panel_last_response_at]
            .into_iter()
            .flatten()
            .fold(self.started_at, |latest, t| latest.max(t))
    }
}

/// Partial update of an interview
///
/// `started_at` and `started_by` are deliberately absent: they are written
/// once on creation and never again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterviewPatch {
    pub candidate_last_response_at: Option<DateTime<Utc>>,
    pub panel_last_response_at: Option<DateTime<Utc>>,
    pub status: Option<InterviewStatus>,
    /// Bookkeeping timestamp; left unchanged when absent
    pub updated_at: Option<DateTime<Utc>>,
}

impl InterviewPatch {
    /// Record a response from `role` at `at`; no-op for the AI role
    pub fn responded(mut self, role: SpeakerRole, at: DateTime<Utc>) -> Self {
        match role {
            SpeakerRole::Candidate => self.candidate_last_response_at = Some(at),
            SpeakerRole::Panel => self.panel_last_response_at = Some(at),
            SpeakerRole::Ai => {}
        }
        self
    }

    pub fn with_status(mut self, status: InterviewStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Stamp `updated_at` with the caller's clock
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.updated_at = Some(now);
        self
    }

    /// True when no interview field changes (a bare stamp does not count)
    pub fn is_empty(&self) -> bool {
        self.candidate_last_response_at.is_none()
            && self.panel_last_response_at.is_none()
            && self.status.is_none()
    }
}

/// Transcript line before the store assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranscriptLine {
    pub interview_id: String,
    pub speaker_name: String,
    pub speaker_role: SpeakerRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the `transcripts` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub id: i64,
    pub interview_id: String,
    pub speaker_name: String,
    pub speaker_role: SpeakerRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
