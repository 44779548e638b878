//! SQLite-backed interview store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ivts_common::db::{
    Interview, InterviewPatch, InterviewStatus, NewTranscriptLine, TranscriptLine,
};
use ivts_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};

use super::{InterviewStore, InterviewTransaction};

const INTERVIEW_COLUMNS: &str = "id, window_start, window_end, candidate_last_response_at, \
     panel_last_response_at, started_at, started_by, status, updated_at";

/// Interview store on a SQLite connection pool
#[derive(Clone)]
pub struct SqliteInterviewStore {
    pool: SqlitePool,
}

impl SqliteInterviewStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn interview_from_row(row: &SqliteRow) -> Result<Interview> {
    let started_by: String = row.try_get("started_by")?;
    let status: String = row.try_get("status")?;

    Ok(Interview {
        id: row.try_get("id")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        candidate_last_response_at: row.try_get("candidate_last_response_at")?,
        panel_last_response_at: row.try_get("panel_last_response_at")?,
        started_at: row.try_get("started_at")?,
        started_by: started_by
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt started_by column: {}", e)))?,
        status: status
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt status column: {}", e)))?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transcript_from_row(row: &SqliteRow) -> Result<TranscriptLine> {
    let role: String = row.try_get("speaker_role")?;

    Ok(TranscriptLine {
        id: row.try_get("id")?,
        interview_id: row.try_get("interview_id")?,
        speaker_name: row.try_get("speaker_name")?,
        speaker_role: role
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt speaker_role column: {}", e)))?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn find_interview<'e, E>(executor: E, interview_id: &str) -> Result<Option<Interview>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM interviews WHERE id = ?",
        INTERVIEW_COLUMNS
    ))
    .bind(interview_id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(interview_from_row).transpose()
}

#[async_trait]
impl InterviewStore for SqliteInterviewStore {
    async fn begin(&self) -> Result<Box<dyn InterviewTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteInterviewTransaction { tx }))
    }

    async fn find(&self, interview_id: &str) -> Result<Option<Interview>> {
        find_interview(&self.pool, interview_id).await
    }

    async fn list_by_status(&self, status: InterviewStatus) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM interviews WHERE status = ? ORDER BY started_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_interviews_by_status(&self, status: InterviewStatus) -> Result<Vec<Interview>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM interviews WHERE status = ? ORDER BY started_at ASC, id ASC",
            INTERVIEW_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interview_from_row).collect()
    }

    async fn list_conversation(&self, interview_id: &str) -> Result<Vec<TranscriptLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, interview_id, speaker_name, speaker_role, text, created_at
            FROM transcripts
            WHERE interview_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transcript_from_row).collect()
    }

    async fn delete_all(&self, interview_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let lines = sqlx::query("DELETE FROM transcripts WHERE interview_id = ?")
            .bind(interview_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let interviews = sqlx::query("DELETE FROM interviews WHERE id = ?")
            .bind(interview_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::debug!(interview_id, lines, interviews, "Deleted interview");
        Ok(lines + interviews)
    }
}

/// Open SQLite transaction; rolled back on drop unless committed
pub struct SqliteInterviewTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl InterviewTransaction for SqliteInterviewTransaction {
    async fn find(&mut self, interview_id: &str) -> Result<Option<Interview>> {
        find_interview(&mut *self.tx, interview_id).await
    }

    async fn create(&mut self, interview: &Interview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interviews (
                id, window_start, window_end, candidate_last_response_at,
                panel_last_response_at, started_at, started_by, status, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&interview.id)
        .bind(interview.window_start)
        .bind(interview.window_end)
        .bind(interview.candidate_last_response_at)
        .bind(interview.panel_last_response_at)
        .bind(interview.started_at)
        .bind(interview.started_by.as_str())
        .bind(interview.status.as_str())
        .bind(interview.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update(&mut self, interview_id: &str, patch: &InterviewPatch) -> Result<()> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM interviews WHERE id = ?")
                .bind(interview_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        let current: InterviewStatus = match current {
            Some(status) => status
                .parse()
                .map_err(|e| Error::Internal(format!("Corrupt status column: {}", e)))?,
            None => return Err(Error::NotFound(format!("Interview {}", interview_id))),
        };

        if let Some(next) = patch.status {
            if !current.can_advance_to(next) {
                return Err(Error::InvalidInput(format!(
                    "Interview {} cannot move from {} back to {}",
                    interview_id, current, next
                )));
            }
        }

        if patch.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE interviews SET
                candidate_last_response_at = COALESCE(?, candidate_last_response_at),
                panel_last_response_at = COALESCE(?, panel_last_response_at),
                status = COALESCE(?, status),
                updated_at = COALESCE(?, updated_at)
            WHERE id = ?
            "#,
        )
        .bind(patch.candidate_last_response_at)
        .bind(patch.panel_last_response_at)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.updated_at)
        .bind(interview_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_transcript(&mut self, line: &NewTranscriptLine) -> Result<TranscriptLine> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM transcripts WHERE interview_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(&line.interview_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let created_at = match latest {
            Some(latest) if latest > line.created_at => latest,
            _ => line.created_at,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO transcripts (interview_id, speaker_name, speaker_role, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&line.interview_id)
        .bind(&line.speaker_name)
        .bind(line.speaker_role.as_str())
        .bind(&line.text)
        .bind(created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(TranscriptLine {
            id: result.last_insert_rowid(),
            interview_id: line.interview_id.clone(),
            speaker_name: line.speaker_name.clone(),
            speaker_role: line.speaker_role,
            text: line.text.clone(),
            created_at,
        })
    }

    async fn delete_transcripts(&mut self, interview_id: &str) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM transcripts WHERE interview_id = ?")
            .bind(interview_id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_interview(
        &mut self,
        interview_id: &str,
        expected_status: InterviewStatus,
    ) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM interviews WHERE id = ? AND status = ?")
            .bind(interview_id)
            .bind(expected_status.as_str())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}
