//! Finalization sweep
//!
//! Periodic batch job closing out the interview lifecycle:
//! - completed interviews are rendered to an archive document, then their
//!   transcript lines are deleted and they move to processed (and are
//!   purged when configured)
//! - leftover processed interviews are purged
//! - in-progress interviews with no activity for `stale_after` are deleted
//!
//! The sweep takes no per-interview lock. Every delete re-checks, inside its
//! own transaction, that the interview is still in the state observed when
//! it was listed. Rendering happens outside any transaction. A failure on
//! one interview is recorded in the report and the pass moves on.

pub mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use ivts_common::config::SweepConfig;
use ivts_common::db::{retry_on_lock, Interview, InterviewPatch, InterviewStatus};
use ivts_common::{Clock, Error, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::InterviewStore;
pub use render::{renderer_for, PdfTranscriptRenderer, TextTranscriptRenderer, TranscriptRenderer};

/// Sweep behavior resolved from configuration
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub interval: StdDuration,
    pub stale_after: Duration,
    pub archive_dir: PathBuf,
    pub purge_processed: bool,
    pub max_lock_wait_ms: u64,
}

impl SweepSettings {
    pub fn from_config(config: &SweepConfig, root_folder: &Path, max_lock_wait_ms: u64) -> Self {
        Self {
            interval: StdDuration::from_secs(config.interval_secs),
            stale_after: config.stale_after(),
            archive_dir: config.resolved_archive_dir(root_folder),
            purge_processed: config.purge_processed,
            max_lock_wait_ms,
        }
    }
}

/// Result of archiving one interview
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Archived {
        document: PathBuf,
        lines_deleted: u64,
        record_purged: bool,
    },
    /// Interview was no longer completed when the sweep got to it
    Skipped { status: InterviewStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub interview_id: String,
    pub stage: &'static str,
    pub error: String,
    pub retryable: bool,
}

/// Summary of one sweep pass
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub archived: Vec<String>,
    pub purged: Vec<String>,
    pub stale_deleted: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            archived: Vec::new(),
            purged: Vec::new(),
            stale_deleted: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, interview_id: &str, stage: &'static str, err: &Error) {
        warn!(
            run_id = %self.run_id,
            interview_id,
            stage,
            retryable = err.is_retryable(),
            "Sweep step failed: {}",
            err
        );
        self.failures.push(SweepFailure {
            interview_id: interview_id.to_string(),
            stage,
            error: err.to_string(),
            retryable: err.is_retryable(),
        });
    }
}

/// Keep only characters that are safe in a file name
fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "interview".to_string()
    } else {
        cleaned
    }
}

pub struct FinalizationSweep {
    store: Arc<dyn InterviewStore>,
    renderer: Arc<dyn TranscriptRenderer>,
    clock: Arc<dyn Clock>,
    settings: SweepSettings,
}

impl FinalizationSweep {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        renderer: Arc<dyn TranscriptRenderer>,
        clock: Arc<dyn Clock>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            store,
            renderer,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Where the archive document for an interview goes
    pub fn document_path(&self, interview_id: &str, candidate: Option<&str>) -> PathBuf {
        let stem = match candidate {
            Some(name) => format!(
                "{}_{}",
                sanitize_file_component(name),
                sanitize_file_component(interview_id)
            ),
            None => sanitize_file_component(interview_id),
        };
        self.settings
            .archive_dir
            .join(format!("{}.{}", stem, self.renderer.extension()))
    }

    /// Spawn the periodic sweep loop
    pub fn run(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            "Starting finalization sweep (interval: {}s, stale after: {} min, archive: {})",
            self.settings.interval.as_secs(),
            self.settings.stale_after.num_minutes(),
            self.settings.archive_dir.display()
        );

        tokio::spawn(async move {
            let mut timer = interval(self.settings.interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                if let Err(e) = self.run_once().await {
                    error!("Finalization sweep pass failed: {}", e);
                }
            }
        })
    }

    /// One full pass. Listing failures abort the pass; per-interview
    /// failures are recorded in the report.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let mut report = SweepReport::new(self.clock.now());
        debug!(run_id = %report.run_id, "Sweep pass started");

        for interview_id in self.store.list_by_status(InterviewStatus::Completed).await? {
            match self.archive_interview(&interview_id).await {
                Ok(ArchiveOutcome::Archived { record_purged, .. }) => {
                    report.archived.push(interview_id.clone());
                    if record_purged {
                        report.purged.push(interview_id);
                    }
                }
                Ok(ArchiveOutcome::Skipped { .. }) | Err(Error::NotFound(_)) => {
                    report.skipped.push(interview_id)
                }
                Err(e) => report.fail(&interview_id, "archive", &e),
            }
        }

        if self.settings.purge_processed {
            for interview_id in self.store.list_by_status(InterviewStatus::Processed).await? {
                match self.purge_processed(&interview_id).await {
                    Ok(true) => report.purged.push(interview_id),
                    Ok(false) => report.skipped.push(interview_id),
                    Err(e) => report.fail(&interview_id, "purge", &e),
                }
            }
        }

        let cutoff = self.clock.now() - self.settings.stale_after;
        for interview in self
            .store
            .list_interviews_by_status(InterviewStatus::InProgress)
            .await?
        {
            if interview.last_activity() >= cutoff {
                continue;
            }
            match self.delete_if_stale(&interview, cutoff).await {
                Ok(true) => report.stale_deleted.push(interview.id),
                Ok(false) => report.skipped.push(interview.id),
                Err(e) => report.fail(&interview.id, "stale", &e),
            }
        }

        info!(
            run_id = %report.run_id,
            archived = report.archived.len(),
            purged = report.purged.len(),
            stale_deleted = report.stale_deleted.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Sweep pass finished"
        );

        Ok(report)
    }

    /// Render a completed interview and retire it
    ///
    /// Returns `NotFound` when the interview no longer exists, so running
    /// it twice is harmless.
    pub async fn archive_interview(&self, interview_id: &str) -> Result<ArchiveOutcome> {
        let interview = self
            .store
            .find(interview_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {}", interview_id)))?;
        if interview.status != InterviewStatus::Completed {
            return Ok(ArchiveOutcome::Skipped {
                status: interview.status,
            });
        }

        let conversation = self.store.list_conversation(interview_id).await?;
        let document = self.document_path(
            interview_id,
            render::candidate_display_name(&conversation),
        );

        self.renderer
            .render(&interview, &conversation, &document)
            .await?;

        if !tokio::fs::try_exists(&document).await.unwrap_or(false) {
            return Err(Error::RenderFailure(format!(
                "Renderer reported success but {} does not exist",
                document.display()
            )));
        }

        let this = self;
        let path = document.as_path();
        let outcome = retry_on_lock("archive_interview", self.settings.max_lock_wait_ms, move || {
            this.retire_completed(interview_id, path)
        })
        .await?;

        if let ArchiveOutcome::Archived {
            lines_deleted,
            record_purged,
            ..
        } = &outcome
        {
            info!(
                interview_id,
                lines_deleted,
                record_purged,
                document = %document.display(),
                "Archived interview"
            );
        }

        Ok(outcome)
    }

    async fn retire_completed(&self, interview_id: &str, document: &Path) -> Result<ArchiveOutcome> {
        let mut tx = self.store.begin().await?;

        let current = tx
            .find(interview_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {}", interview_id)))?;
        if current.status != InterviewStatus::Completed {
            return Ok(ArchiveOutcome::Skipped {
                status: current.status,
            });
        }

        let lines_deleted = tx.delete_transcripts(interview_id).await?;
        tx.update(
            interview_id,
            &InterviewPatch::default()
                .with_status(InterviewStatus::Processed)
                .stamped(self.clock.now()),
        )
        .await?;
        let record_purged = if self.settings.purge_processed {
            tx.delete_interview(interview_id, InterviewStatus::Processed)
                .await?
        } else {
            false
        };

        tx.commit().await?;

        Ok(ArchiveOutcome::Archived {
            document: document.to_path_buf(),
            lines_deleted,
            record_purged,
        })
    }

    /// Delete a processed interview that is still around
    pub async fn purge_processed(&self, interview_id: &str) -> Result<bool> {
        let this = self;
        retry_on_lock("purge_processed", self.settings.max_lock_wait_ms, move || {
            this.purge_processed_once(interview_id)
        })
        .await
    }

    async fn purge_processed_once(&self, interview_id: &str) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        tx.delete_transcripts(interview_id).await?;
        let deleted = tx
            .delete_interview(interview_id, InterviewStatus::Processed)
            .await?;
        if !deleted {
            // Not processed (or gone); leave any lines alone
            return Ok(false);
        }
        tx.commit().await?;

        debug!(interview_id, "Purged processed interview");
        Ok(true)
    }

    /// Delete an in-progress interview whose last activity is before `cutoff`
    pub async fn delete_if_stale(&self, observed: &Interview, cutoff: DateTime<Utc>) -> Result<bool> {
        let this = self;
        retry_on_lock("delete_if_stale", self.settings.max_lock_wait_ms, move || {
            this.delete_if_stale_once(observed, cutoff)
        })
        .await
    }

    async fn delete_if_stale_once(&self, observed: &Interview, cutoff: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.store.begin().await?;

        let Some(current) = tx.find(&observed.id).await? else {
            return Ok(false);
        };
        if current.status != InterviewStatus::InProgress || current.last_activity() >= cutoff {
            // A submission arrived after the listing
            return Ok(false);
        }

        let lines = tx.delete_transcripts(&current.id).await?;
        let deleted = tx
            .delete_interview(&current.id, InterviewStatus::InProgress)
            .await?;
        tx.commit().await?;

        info!(
            interview_id = %current.id,
            lines,
            last_activity = %current.last_activity(),
            "Deleted stale interview"
        );
        Ok(deleted)
    }
}
