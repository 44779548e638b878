//! Test Helper Utilities
//!
//! Shared setup for ivts-ts integration tests: a throwaway database in a
//! temp dir, a manual clock and the writer/sweep wired to both.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ivts_common::db::{init_database, InterviewStatus, ScheduledWindow, SpeakerRole};
use ivts_common::ManualClock;
use ivts_ts::db::SqliteInterviewStore;
use ivts_ts::session::{SessionRules, TranscriptSubmission, TranscriptWriter};
use ivts_ts::sweep::{FinalizationSweep, SweepSettings, TextTranscriptRenderer, TranscriptRenderer};
use ivts_ts::{build_router, AppState};
use tempfile::TempDir;

/// Fixed test day, 2024-05-01 at `h:m` UTC
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
}

pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<ScheduledWindow> {
    Some(ScheduledWindow::new(start, end).unwrap())
}

/// Participant submission inside the default 10:00-11:00 window
pub fn submission(interview_id: &str, name: &str, role: SpeakerRole, text: &str) -> TranscriptSubmission {
    TranscriptSubmission {
        interview_id: interview_id.to_string(),
        speaker_name: name.to_string(),
        role,
        text: text.to_string(),
        window: window(at(10, 0), at(11, 0)),
        requested_status: InterviewStatus::InProgress,
    }
}

pub struct TestHarness {
    /// Keeps the database and archive alive for the duration of the test
    pub temp_dir: TempDir,
    pub store: Arc<SqliteInterviewStore>,
    pub clock: Arc<ManualClock>,
    pub writer: Arc<TranscriptWriter>,
    pub sweep: Arc<FinalizationSweep>,
}

pub struct HarnessOptions {
    pub rules: SessionRules,
    pub purge_processed: bool,
    pub stale_after: Duration,
    pub renderer: Arc<dyn TranscriptRenderer>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            rules: SessionRules::default(),
            purge_processed: true,
            stale_after: Duration::minutes(30),
            renderer: Arc::new(TextTranscriptRenderer),
        }
    }
}

pub async fn harness() -> TestHarness {
    harness_with(HarnessOptions::default()).await
}

pub async fn harness_with(options: HarnessOptions) -> TestHarness {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("ivts.db")).await.unwrap();

    let store = Arc::new(SqliteInterviewStore::new(pool));
    let clock = Arc::new(ManualClock::new(at(10, 0)));

    let writer = Arc::new(TranscriptWriter::new(
        store.clone(),
        clock.clone(),
        options.rules,
        5000,
    ));

    let settings = SweepSettings {
        interval: std::time::Duration::from_secs(60),
        stale_after: options.stale_after,
        archive_dir: temp_dir.path().join("transcripts"),
        purge_processed: options.purge_processed,
        max_lock_wait_ms: 5000,
    };
    let sweep = Arc::new(FinalizationSweep::new(
        store.clone(),
        options.renderer,
        clock.clone(),
        settings,
    ));

    TestHarness {
        temp_dir,
        store,
        clock,
        writer,
        sweep,
    }
}

impl TestHarness {
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(
            self.store.clone(),
            self.writer.clone(),
            self.sweep.clone(),
        ))
    }

    pub async fn transcript_count(&self, interview_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM transcripts WHERE interview_id = ?")
            .bind(interview_id)
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }

    /// Take the SQLite write lock from a separate connection and release it
    /// after `hold`. Await the handle to make sure it was released.
    pub async fn hold_write_lock(&self, hold: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let mut conn = self.store.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            sqlx::query("ROLLBACK").execute(&mut *conn).await.unwrap();
        })
    }

    /// Submit at the given instant
    pub async fn submit_at(
        &self,
        now: DateTime<Utc>,
        submission: TranscriptSubmission,
    ) -> ivts_ts::session::SubmissionOutcome {
        self.clock.set(now);
        self.writer.submit(submission).await.unwrap()
    }
}
