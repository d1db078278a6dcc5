//! Fetch-and-store: re-host a candidate's media in object storage.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::database::models::{JobType, NewJob};
use crate::database::repositories::{CandidateRepository, JobRepository};
use crate::database::time::now_ms;
use crate::domain::{CandidateMedia, Platform, PrimaryMedia};
use crate::providers::storage::{media_format, storage_key};
use crate::providers::{MediaDownloader, MediaPurpose, MediaResolver, ObjectStorage};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub media: CandidateMedia,
    /// Analysis job queued for the candidate, `None` if one was already live.
    pub analysis_job_id: Option<i64>,
}

pub struct FetchWorker {
    candidates: Arc<dyn CandidateRepository>,
    jobs: Arc<dyn JobRepository>,
    resolver: Arc<dyn MediaResolver>,
    downloader: Arc<dyn MediaDownloader>,
    storage: Arc<dyn ObjectStorage>,
    max_attempts: i64,
}

impl FetchWorker {
    pub fn new(
        candidates: Arc<dyn CandidateRepository>,
        jobs: Arc<dyn JobRepository>,
        resolver: Arc<dyn MediaResolver>,
        downloader: Arc<dyn MediaDownloader>,
        storage: Arc<dyn ObjectStorage>,
        max_attempts: i64,
    ) -> Self {
        Self {
            candidates,
            jobs,
            resolver,
            downloader,
            storage,
            max_attempts,
        }
    }

    /// Re-host the candidate's media and queue its analysis.
    ///
    /// Safe to re-run: every run writes new storage objects and the candidate
    /// ends up pointing at the latest ones.
    pub async fn fetch(&self, external_id: &str) -> Result<FetchOutcome> {
        let candidate = self
            .candidates
            .get_candidate(external_id)
            .await?
            .into_domain()?;
        self.candidates.mark_processing(external_id).await?;

        let media = match self
            .rehost(
                candidate.platform,
                external_id,
                &candidate.source_url,
                candidate.thumbnail_source_url.as_deref(),
                candidate.creator.avatar_url.as_deref(),
            )
            .await
        {
            Ok(media) => media,
            Err(e) => {
                warn!(candidate_id = %external_id, error = %e, "Fetch failed");
                self.candidates
                    .mark_failed(external_id, &e.to_string())
                    .await?;
                return Err(e);
            }
        };

        self.candidates.complete_fetch(external_id, &media).await?;

        let job = NewJob::new(external_id, JobType::Analyze, self.max_attempts);
        let analysis_job_id = self.jobs.enqueue(&job).await?;

        info!(
            candidate_id = %external_id,
            photo_post = media.is_photo_post(),
            items = media.primary_urls().len(),
            analysis_job_id = ?analysis_job_id,
            "Media re-hosted"
        );
        Ok(FetchOutcome {
            media,
            analysis_job_id,
        })
    }

    async fn rehost(
        &self,
        platform: Platform,
        external_id: &str,
        source_url: &str,
        fallback_thumbnail: Option<&str>,
        fallback_avatar: Option<&str>,
    ) -> Result<CandidateMedia> {
        let manifest = self.resolver.resolve(source_url).await?;

        let primary = match &manifest.primary {
            PrimaryMedia::Video { url } => PrimaryMedia::Video {
                url: self
                    .copy(platform, external_id, url, MediaPurpose::Video, None)
                    .await?,
            },
            PrimaryMedia::PhotoSet { urls } => {
                let mut stored = Vec::with_capacity(urls.len());
                for (index, url) in urls.iter().enumerate() {
                    // Partial photo-sets are acceptable.
                    match self
                        .copy(platform, external_id, url, MediaPurpose::Image, Some(index))
                        .await
                    {
                        Ok(stored_url) => stored.push(stored_url),
                        Err(e) => warn!(
                            candidate_id = %external_id,
                            image = index + 1,
                            error = %e,
                            "Skipping photo-set image"
                        ),
                    }
                }
                if stored.is_empty() {
                    return Err(Error::UploadFailed(format!(
                        "none of the {} photo-set images could be re-hosted",
                        urls.len()
                    )));
                }
                PrimaryMedia::PhotoSet { urls: stored }
            }
        };

        let thumbnail_source = manifest.thumbnail_url.as_deref().or(fallback_thumbnail);
        let avatar_source = manifest.creator_avatar_url.as_deref().or(fallback_avatar);

        Ok(CandidateMedia {
            primary,
            thumbnail_url: self
                .copy_best_effort(platform, external_id, thumbnail_source, MediaPurpose::Thumbnail)
                .await,
            creator_avatar_url: self
                .copy_best_effort(platform, external_id, avatar_source, MediaPurpose::Avatar)
                .await,
        })
    }

    /// Download one asset and upload it under a fresh key.
    async fn copy(
        &self,
        platform: Platform,
        external_id: &str,
        url: &str,
        purpose: MediaPurpose,
        index: Option<usize>,
    ) -> Result<String> {
        let media = self.downloader.download(url).await?;
        let (ext, content_type) = media_format(media.content_type.as_deref(), purpose);
        let key = storage_key(platform, external_id, purpose, index, now_ms(), ext);
        self.storage.upload(&key, media.data, content_type).await
    }

    async fn copy_best_effort(
        &self,
        platform: Platform,
        external_id: &str,
        url: Option<&str>,
        purpose: MediaPurpose,
    ) -> Option<String> {
        let url = url?;
        match self.copy(platform, external_id, url, purpose, None).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                let purpose: &'static str = purpose.into();
                warn!(candidate_id = %external_id, purpose, error = %e, "Optional media not re-hosted");
                None
            }
        }
    }
}
