//! Job repository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::database::models::{JobCounts, JobDbModel, JobStatus, NewJob};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::utils::json::{self, JsonContext};
use crate::{Error, Result};

/// Job repository trait.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get_job(&self, id: i64) -> Result<JobDbModel>;
    async fn list_jobs_for_candidate(&self, candidate_id: &str) -> Result<Vec<JobDbModel>>;
    /// Insert a pending job unless an identical one is still pending or processing.
    /// Returns the new id, or `None` when deduplicated.
    async fn enqueue(&self, job: &NewJob) -> Result<Option<i64>>;
    /// Atomically claim the highest-priority, oldest pending job.
    async fn claim_next_pending_job(&self) -> Result<Option<JobDbModel>>;
    /// Returns false if the job was no longer `processing`.
    async fn mark_completed(&self, id: i64) -> Result<bool>;
    /// Record a failed attempt. The job goes back to `pending` while attempts
    /// remain and `retryable` is set, otherwise it becomes `failed`.
    /// Returns the resulting status, or `None` if the job was no longer `processing`.
    async fn mark_failed_attempt(
        &self,
        id: i64,
        error: &str,
        retryable: bool,
    ) -> Result<Option<JobStatus>>;
    /// Fail every `processing` job created before `cutoff_ms`.
    async fn fail_stale_jobs(&self, cutoff_ms: i64, error: &str) -> Result<Vec<JobDbModel>>;
    async fn count_by_status(&self) -> Result<JobCounts>;
    /// Delete completed/failed jobs last touched more than `retention_days` ago.
    async fn cleanup_old_jobs(&self, retention_days: u32) -> Result<u64>;
}

/// SQLx implementation of JobRepository.
pub struct SqlxJobRepository {
    pool: SqlitePool,
}

impl SqlxJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn get_job(&self, id: i64) -> Result<JobDbModel> {
        sqlx::query_as::<_, JobDbModel>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Job", id.to_string()))
    }

    async fn list_jobs_for_candidate(&self, candidate_id: &str) -> Result<Vec<JobDbModel>> {
        let jobs = sqlx::query_as::<_, JobDbModel>(
            "SELECT * FROM jobs WHERE candidate_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn enqueue(&self, job: &NewJob) -> Result<Option<i64>> {
        let payload = json::to_string_or(
            &job.payload,
            "{}",
            JsonContext::NewJob {
                candidate_id: &job.candidate_id,
                job_type: job.job_type.as_str(),
                field: "payload",
            },
            "Failed to serialize job payload",
        );
        let payload = payload.as_str();
        let now = now_ms();

        retry_on_sqlite_busy("enqueue_job", || async {
            let id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO jobs (
                    candidate_id, job_type, status, priority, attempts, max_attempts,
                    payload, created_at, updated_at
                )
                SELECT ?, ?, 'pending', ?, 0, ?, ?, ?, ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM jobs
                    WHERE candidate_id = ? AND job_type = ? AND payload = ?
                      AND status IN ('pending', 'processing')
                )
                RETURNING id
                "#,
            )
            .bind(&job.candidate_id)
            .bind(job.job_type.as_str())
            .bind(job.priority)
            .bind(job.max_attempts)
            .bind(payload)
            .bind(now)
            .bind(now)
            .bind(&job.candidate_id)
            .bind(job.job_type.as_str())
            .bind(payload)
            .fetch_optional(&self.pool)
            .await?;
            Ok(id)
        })
        .await
    }

    async fn claim_next_pending_job(&self) -> Result<Option<JobDbModel>> {
        retry_on_sqlite_busy("claim_next_pending_job", || async {
            let now = now_ms();
            // The outer `status = 'pending'` guard makes the claim a compare-and-swap.
            let job = sqlx::query_as::<_, JobDbModel>(
                r#"
                UPDATE jobs
                SET status = 'processing',
                    attempts = attempts + 1,
                    started_at = ?,
                    updated_at = ?
                WHERE id = (
                    SELECT id FROM jobs
                    WHERE status = 'pending' AND attempts < max_attempts
                    ORDER BY priority DESC, created_at ASC, id ASC
                    LIMIT 1
                )
                AND status = 'pending'
                RETURNING *
                "#,
            )
            .bind(now)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
            Ok(job)
        })
        .await
    }

    async fn mark_completed(&self, id: i64) -> Result<bool> {
        retry_on_sqlite_busy("mark_job_completed", || async {
            let now = now_ms();
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'completed', error_message = NULL, completed_at = ?, updated_at = ?
                WHERE id = ? AND status = 'processing'
                "#,
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
        .await
    }

    async fn mark_failed_attempt(
        &self,
        id: i64,
        error: &str,
        retryable: bool,
    ) -> Result<Option<JobStatus>> {
        let status: Option<String> = retry_on_sqlite_busy("mark_job_failed_attempt", || async {
            let now = now_ms();
            let status = sqlx::query_scalar::<_, String>(
                r#"
                UPDATE jobs
                SET status = CASE
                        WHEN ? = 0 OR attempts >= max_attempts THEN 'failed'
                        ELSE 'pending'
                    END,
                    error_message = ?,
                    completed_at = CASE
                        WHEN ? = 0 OR attempts >= max_attempts THEN ?
                        ELSE NULL
                    END,
                    updated_at = ?
                WHERE id = ? AND status = 'processing'
                RETURNING status
                "#,
            )
            .bind(retryable)
            .bind(error)
            .bind(retryable)
            .bind(now)
            .bind(now)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(status)
        })
        .await?;

        status
            .map(|s| {
                JobStatus::from_str(&s)
                    .map_err(|_| Error::Database(format!("job {id} has unknown status '{s}'")))
            })
            .transpose()
    }

    async fn fail_stale_jobs(&self, cutoff_ms: i64, error: &str) -> Result<Vec<JobDbModel>> {
        retry_on_sqlite_busy("fail_stale_jobs", || async {
            let now = now_ms();
            let jobs = sqlx::query_as::<_, JobDbModel>(
                r#"
                UPDATE jobs
                SET status = 'failed', error_message = ?, completed_at = ?, updated_at = ?
                WHERE status = 'processing' AND created_at < ?
                RETURNING *
                "#,
            )
            .bind(error)
            .bind(now)
            .bind(now)
            .bind(cutoff_ms)
            .fetch_all(&self.pool)
            .await?;
            Ok(jobs)
        })
        .await
    }

    async fn count_by_status(&self) -> Result<JobCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match JobStatus::from_str(&status) {
                Ok(JobStatus::Pending) => counts.pending = count,
                Ok(JobStatus::Processing) => counts.processing = count,
                Ok(JobStatus::Completed) => counts.completed = count,
                Ok(JobStatus::Failed) => counts.failed = count,
                Err(_) => tracing::warn!(status = %status, "Ignoring unknown job status in counts"),
            }
        }
        Ok(counts)
    }

    async fn cleanup_old_jobs(&self, retention_days: u32) -> Result<u64> {
        let cutoff = now_ms() - i64::from(retention_days) * 24 * 60 * 60 * 1000;
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
