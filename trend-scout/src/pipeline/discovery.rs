//! Discovery: pull the trending feed and queue every unseen item.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::models::{CandidateDbModel, JobType, NewJob};
use crate::database::repositories::{CandidateRepository, JobRepository};
use crate::domain::ProcessingStatus;
use crate::providers::TrendingSource;

/// Outcome of one discovery run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Items returned by the feed.
    pub fetched: usize,
    /// External ids inserted as new candidates, in feed order.
    pub inserted: Vec<String>,
    /// Items whose external id was already known.
    pub skipped_duplicates: usize,
    /// Fetch jobs created for the inserted candidates.
    pub queued: usize,
    /// Fetch jobs recreated for known candidates still `pending` without a live fetch job.
    pub requeued: usize,
}

pub struct Discovery {
    source: Arc<dyn TrendingSource>,
    candidates: Arc<dyn CandidateRepository>,
    jobs: Arc<dyn JobRepository>,
    max_attempts: i64,
}

impl Discovery {
    pub fn new(
        source: Arc<dyn TrendingSource>,
        candidates: Arc<dyn CandidateRepository>,
        jobs: Arc<dyn JobRepository>,
        max_attempts: i64,
    ) -> Self {
        Self {
            source,
            candidates,
            jobs,
            max_attempts,
        }
    }

    /// Call the feed once and insert unseen items as `pending` candidates,
    /// each with a queued fetch job. Known ids are skipped, never updated;
    /// a known id that is still `pending` gets its fetch job back if it has
    /// no live one.
    pub async fn discover(&self, limit: usize) -> Result<DiscoveryReport> {
        let drafts = self.source.fetch_trending(limit).await?;
        let mut report = DiscoveryReport {
            fetched: drafts.len(),
            ..Default::default()
        };

        for draft in &drafts {
            let row = CandidateDbModel::from_draft(draft)?;
            if !self.candidates.insert_if_absent(&row).await? {
                debug!(candidate_id = %draft.external_id, "Skipping known candidate");
                report.skipped_duplicates += 1;
                if self.requeue_if_pending(&draft.external_id).await? {
                    report.requeued += 1;
                }
                continue;
            }

            if self.enqueue_fetch(&draft.external_id).await? {
                report.queued += 1;
            }
            report.inserted.push(draft.external_id.clone());
        }

        info!(
            fetched = report.fetched,
            inserted = report.inserted.len(),
            skipped = report.skipped_duplicates,
            requeued = report.requeued,
            "Discovery run finished"
        );
        Ok(report)
    }

    async fn enqueue_fetch(&self, external_id: &str) -> Result<bool> {
        let job = NewJob::new(external_id, JobType::Fetch, self.max_attempts);
        Ok(self.jobs.enqueue(&job).await?.is_some())
    }

    /// Queue a fetch for a known `pending` candidate. A live fetch job dedups it.
    async fn requeue_if_pending(&self, external_id: &str) -> Result<bool> {
        let Some(existing) = self.candidates.find_candidate(external_id).await? else {
            return Ok(false);
        };
        if existing.processing_status != ProcessingStatus::Pending.as_str() {
            return Ok(false);
        }
        let requeued = self.enqueue_fetch(external_id).await?;
        if requeued {
            warn!(candidate_id = %external_id, "Requeued fetch for pending candidate without a live job");
        }
        Ok(requeued)
    }
}
