//! Stale-job reaper.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::Result;
use crate::database::models::JobType;
use crate::database::repositories::{CandidateRepository, JobRepository};
use crate::database::time::ms_ago;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReapReport {
    pub cleaned: usize,
    /// Candidate ids of the reaped jobs.
    pub videos: Vec<String>,
}

pub struct StaleJobReaper {
    jobs: Arc<dyn JobRepository>,
    candidates: Arc<dyn CandidateRepository>,
    timeout: Duration,
}

impl StaleJobReaper {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        candidates: Arc<dyn CandidateRepository>,
        timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            candidates,
            timeout,
        }
    }

    /// Fail every job that has been `processing` since before the timeout.
    pub async fn sweep(&self) -> Result<ReapReport> {
        let message = format!(
            "Job timed out: still processing after {}s",
            self.timeout.as_secs()
        );
        let reaped = self
            .jobs
            .fail_stale_jobs(ms_ago(self.timeout), &message)
            .await?;

        let mut videos: Vec<String> = Vec::new();
        for job in &reaped {
            warn!(
                job_id = job.id,
                job_type = %job.job_type,
                candidate_id = %job.candidate_id,
                "Reaped stale job"
            );

            // A crashed fetch leaves its candidate in `processing`.
            if job.kind().ok() == Some(JobType::Fetch)
                && let Err(e) = self
                    .candidates
                    .fail_if_processing(&job.candidate_id, &message)
                    .await
            {
                warn!(candidate_id = %job.candidate_id, error = %e, "Failed to fail stale candidate");
            }

            if !videos.contains(&job.candidate_id) {
                videos.push(job.candidate_id.clone());
            }
        }

        if !reaped.is_empty() {
            info!(cleaned = reaped.len(), "Stale jobs reaped");
        }
        Ok(ReapReport {
            cleaned: reaped.len(),
            videos,
        })
    }
}
