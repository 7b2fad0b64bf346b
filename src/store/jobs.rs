//! Background job persistence: live records plus a terminal-state archive.
//!
//! A live record only ever holds `NotStarted`, `Running`, or `Paused` —
//! the instant a job reaches `Stopped`, `Complete`, or `Failed` it is moved
//! out of `background_jobs` and into `background_job_archive` within the
//! same transaction (mirrors the upstream `JobArchive` behavior).

use sqlx::FromRow;
use utoipa::ToSchema;

use super::Store;
use crate::error::{Error, JobError, Result};
use crate::types::JobState;

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct BackgroundJobRecord {
    pub uuid: String,
    pub tag: String,
    pub name: String,
    pub pauseable: bool,
    pub recoverable: bool,
    pub state: i32,
    pub progress_current: i64,
    pub progress_denominator: i64,
    pub session_data: Option<String>,
    pub created_time: i64,
    pub updated_time: i64,
}

impl BackgroundJobRecord {
    pub fn state(&self) -> JobState {
        JobState::from_i32(self.state)
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct BackgroundJobArchive {
    pub uuid: String,
    pub tag: String,
    pub name: String,
    pub state: i32,
    pub progress_current: i64,
    pub progress_denominator: i64,
    pub created_time: i64,
    pub finished_time: i64,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Store {
    pub async fn create_job_record(
        &self,
        uuid: &str,
        tag: &str,
        name: &str,
        pauseable: bool,
        recoverable: bool,
    ) -> Result<()> {
        let timestamp = now();
        sqlx::query(
            r#"INSERT INTO background_jobs
                (uuid, tag, name, pauseable, recoverable, state, progress_current, progress_denominator, session_data, created_time, updated_time)
               VALUES (?, ?, ?, ?, ?, ?, 0, 0, NULL, ?, ?)"#,
        )
        .bind(uuid)
        .bind(tag)
        .bind(name)
        .bind(pauseable)
        .bind(recoverable)
        .bind(JobState::NotStarted.to_i32())
        .bind(timestamp)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_job(&self, uuid: &str) -> Result<Option<BackgroundJobRecord>> {
        Ok(
            sqlx::query_as::<_, BackgroundJobRecord>("SELECT * FROM background_jobs WHERE uuid = ?")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_jobs(&self) -> Result<Vec<BackgroundJobRecord>> {
        Ok(
            sqlx::query_as::<_, BackgroundJobRecord>("SELECT * FROM background_jobs ORDER BY created_time ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn list_job_archive(&self, limit: i64, offset: i64) -> Result<Vec<BackgroundJobArchive>> {
        Ok(sqlx::query_as::<_, BackgroundJobArchive>(
            "SELECT * FROM background_job_archive ORDER BY finished_time DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Updates a live job's state and progress. If `state` is terminal, the
    /// record is archived instead of left live, within the same transaction.
    pub async fn update_job_state(
        &self,
        uuid: &str,
        state: JobState,
        progress_current: i64,
        progress_denominator: i64,
        session_data: Option<&str>,
    ) -> Result<()> {
        let record = self
            .get_job(uuid)
            .await?
            .ok_or_else(|| Error::Job(JobError::UnknownTag { tag: uuid.to_string() }))?;

        let mut tx = self.pool.begin().await?;
        let timestamp = now();

        if state.is_terminal() {
            sqlx::query(
                r#"INSERT INTO background_job_archive
                    (uuid, tag, name, state, progress_current, progress_denominator, created_time, finished_time)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&record.uuid)
            .bind(&record.tag)
            .bind(&record.name)
            .bind(state.to_i32())
            .bind(progress_current)
            .bind(progress_denominator)
            .bind(record.created_time)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM background_jobs WHERE uuid = ?")
                .bind(uuid)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"UPDATE background_jobs
                   SET state = ?, progress_current = ?, progress_denominator = ?, session_data = ?, updated_time = ?
                   WHERE uuid = ?"#,
            )
            .bind(state.to_i32())
            .bind(progress_current)
            .bind(progress_denominator)
            .bind(session_data)
            .bind(timestamp)
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_job_record(&self, uuid: &str) -> Result<()> {
        sqlx::query("DELETE FROM background_jobs WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
