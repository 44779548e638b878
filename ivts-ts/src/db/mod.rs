//! Interview session store
//!
//! `InterviewStore` is the backend seam: the session writer and the
//! finalization sweep only talk to these traits. Mutations made on behalf of
//! a transcript submission all go through one `InterviewTransaction`, so the
//! interview update and the transcript insert commit together or not at all.

use async_trait::async_trait;
use ivts_common::db::{
    Interview, InterviewPatch, InterviewStatus, NewTranscriptLine, TranscriptLine,
};
use ivts_common::Result;

mod sqlite;
pub use sqlite::SqliteInterviewStore;

/// Store operations that run on their own pooled connection
#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Open a transaction; dropping it without `commit` rolls back
    async fn begin(&self) -> Result<Box<dyn InterviewTransaction>>;

    async fn find(&self, interview_id: &str) -> Result<Option<Interview>>;

    /// Ids of all interviews currently in `status`, oldest start first
    async fn list_by_status(&self, status: InterviewStatus) -> Result<Vec<String>>;

    /// Full records for all interviews in `status`
    async fn list_interviews_by_status(&self, status: InterviewStatus) -> Result<Vec<Interview>>;

    /// Transcript lines ordered by `created_at` then id, ascending
    async fn list_conversation(&self, interview_id: &str) -> Result<Vec<TranscriptLine>>;

    /// Delete the interview and its lines; returns rows removed (0 when absent)
    async fn delete_all(&self, interview_id: &str) -> Result<u64>;
}

/// Operations bound to one open transaction
#[async_trait]
pub trait InterviewTransaction: Send {
    async fn find(&mut self, interview_id: &str) -> Result<Option<Interview>>;

    async fn create(&mut self, interview: &Interview) -> Result<()>;

    /// Apply a partial update. Fails with `NotFound` when no row matches.
    async fn update(&mut self, interview_id: &str, patch: &InterviewPatch) -> Result<()>;

    /// Insert a line, stamped no earlier than the latest stored line
    async fn append_transcript(&mut self, line: &NewTranscriptLine) -> Result<TranscriptLine>;

    async fn delete_transcripts(&mut self, interview_id: &str) -> Result<u64>;

    /// Delete the interview only while it still has `expected_status`
    async fn delete_interview(
        &mut self,
        interview_id: &str,
        expected_status: InterviewStatus,
    ) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
