//! Queue coordinator: claim one job, run it, record the outcome.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{AnalysisWorker, FetchWorker, TranslationWorker};
use crate::Result;
use crate::database::models::{JobDbModel, JobStatus, JobType};
use crate::database::repositories::JobRepository;
use crate::domain::{AnalysisKind, TargetLanguage};

/// Result of one processed job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: i64,
    pub job_type: String,
    pub candidate_id: String,
    pub success: bool,
    /// Job status after the outcome was recorded.
    pub status: Option<JobStatus>,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No pending job was available.
    Empty,
    Processed(JobOutcome),
}

pub struct QueueCoordinator {
    jobs: Arc<dyn JobRepository>,
    fetch: Arc<FetchWorker>,
    analysis: Arc<AnalysisWorker>,
    translation: Arc<TranslationWorker>,
}

impl QueueCoordinator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        fetch: Arc<FetchWorker>,
        analysis: Arc<AnalysisWorker>,
        translation: Arc<TranslationWorker>,
    ) -> Self {
        Self {
            jobs,
            fetch,
            analysis,
            translation,
        }
    }

    /// Claim and run exactly one job.
    pub async fn process_next(&self) -> Result<TickOutcome> {
        let Some(job) = self.jobs.claim_next_pending_job().await? else {
            return Ok(TickOutcome::Empty);
        };

        info!(
            job_id = job.id,
            job_type = %job.job_type,
            candidate_id = %job.candidate_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        let outcome = match self.dispatch(&job).await {
            Ok(()) => {
                let recorded = self.jobs.mark_completed(job.id).await?;
                if !recorded {
                    warn!(job_id = job.id, "Job left processing before it completed; outcome not recorded");
                }
                JobOutcome {
                    job_id: job.id,
                    job_type: job.job_type.clone(),
                    candidate_id: job.candidate_id.clone(),
                    success: true,
                    status: recorded.then_some(JobStatus::Completed),
                    attempts: job.attempts,
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                let status = self
                    .jobs
                    .mark_failed_attempt(job.id, &message, e.is_retryable())
                    .await?;
                match status {
                    Some(JobStatus::Failed) => {
                        error!(job_id = job.id, error = %message, "Job failed terminally")
                    }
                    _ => warn!(job_id = job.id, error = %message, status = ?status, "Job attempt failed"),
                }
                JobOutcome {
                    job_id: job.id,
                    job_type: job.job_type.clone(),
                    candidate_id: job.candidate_id.clone(),
                    success: false,
                    status,
                    attempts: job.attempts,
                    error: Some(message),
                }
            }
        };

        Ok(TickOutcome::Processed(outcome))
    }

    /// Run jobs until the queue is empty or `max_jobs` were processed.
    pub async fn drain(&self, max_jobs: usize) -> Result<usize> {
        let mut processed = 0;
        while processed < max_jobs {
            match self.process_next().await? {
                TickOutcome::Empty => break,
                TickOutcome::Processed(_) => processed += 1,
            }
        }
        Ok(processed)
    }

    async fn dispatch(&self, job: &JobDbModel) -> Result<()> {
        match job.kind()? {
            JobType::Fetch => {
                self.fetch.fetch(&job.candidate_id).await?;
            }
            JobType::Analyze => {
                self.analysis.analyze(&job.candidate_id).await?;
            }
            JobType::Translate => {
                let payload = job.parsed_payload();
                let target = payload.target_lang.unwrap_or(TargetLanguage::En);
                let kind = payload.analysis_kind.unwrap_or(AnalysisKind::Regular);
                self.translation
                    .translate(&job.candidate_id, target, kind)
                    .await?;
            }
        }
        Ok(())
    }
}
