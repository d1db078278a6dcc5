//! Analysis: score a re-hosted candidate with the multimodal model.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ActivationTimeoutPolicy, PipelineConfig};
use crate::database::models::{JobPayload, JobType, NewJob};
use crate::database::repositories::{CandidateRepository, JobRepository};
use crate::domain::analysis::{extract_score, is_adaptable, parse_model_output};
use crate::domain::{AnalysisKind, CandidateMedia};
use crate::providers::{FileState, InferenceProvider, MediaDownloader, RemoteFile};
use crate::{Error, Result};

const ANALYSIS_PROMPT: &str = r#"You are a short-form video strategist. Study the attached {media} and explain the mechanic that made it work, so it can be reused for unrelated promotional content (for example a music release).

Respond with a single JSON object and nothing else, using exactly these keys:
{
  "adaptation_score": <number from 0 to 10, how easily the mechanic transfers to unrelated content>,
  "original_mechanic": "<what happens and what the core format/mechanic is>",
  "why_viral": "<why it succeeded with viewers>",
  "reapplication": {
    "target_topics": ["<topics or niches the mechanic fits>"],
    "production_needs": ["<props, locations, people, editing>"],
    "engagement_factors": ["<what drives comments, shares and rewatches>"],
    "shot_list_template": [
      {"shot": 1, "description": "<what is filmed>", "on_screen_text": "<overlay text, if any>"}
    ]
  }
}"#;

fn analysis_prompt(media: &CandidateMedia) -> String {
    let subject = if media.is_photo_post() {
        "photo carousel (images in order)"
    } else {
        "video"
    };
    ANALYSIS_PROMPT.replace("{media}", subject)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Parsed model output as persisted in `gemini_analysis`.
    pub analysis: Value,
    pub adaptation_score: Option<f64>,
    pub is_adaptable: Option<bool>,
    /// Translation jobs queued for the configured follow-up languages.
    pub translation_jobs: Vec<i64>,
}

pub struct AnalysisWorker {
    candidates: Arc<dyn CandidateRepository>,
    jobs: Arc<dyn JobRepository>,
    downloader: Arc<dyn MediaDownloader>,
    inference: Arc<dyn InferenceProvider>,
    config: PipelineConfig,
}

impl AnalysisWorker {
    pub fn new(
        candidates: Arc<dyn CandidateRepository>,
        jobs: Arc<dyn JobRepository>,
        downloader: Arc<dyn MediaDownloader>,
        inference: Arc<dyn InferenceProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            candidates,
            jobs,
            downloader,
            inference,
            config,
        }
    }

    /// Analyze a completed candidate. Does not touch `processing_status`.
    pub async fn analyze(&self, external_id: &str) -> Result<AnalysisOutcome> {
        let candidate = self
            .candidates
            .get_candidate(external_id)
            .await?
            .into_domain()?;
        let media = candidate
            .analyzable_media()
            .cloned()
            .ok_or_else(|| Error::MediaNotReady(external_id.to_string()))?;

        let mut uploaded: Vec<RemoteFile> = Vec::new();
        let result = self.run_inference(external_id, &media, &mut uploaded).await;
        self.delete_remote_files(external_id, &uploaded).await;
        let text = result?;

        let analysis = parse_model_output(&text);
        if analysis.get("raw_analysis").is_some() {
            warn!(candidate_id = %external_id, "Model output was not JSON; storing raw text");
        }
        let adaptation_score = extract_score(&analysis);
        let adaptable =
            adaptation_score.map(|s| is_adaptable(s, self.config.adaptability_threshold));

        self.candidates
            .save_analysis(external_id, &analysis.to_string(), adaptation_score, adaptable)
            .await
            .map_err(|e| Error::Persist(e.to_string()))?;

        let mut translation_jobs = Vec::new();
        for lang in &self.config.follow_up_languages {
            let job = NewJob::new(external_id, JobType::Translate, self.config.default_max_attempts)
                .with_payload(JobPayload::translate(*lang, AnalysisKind::Regular));
            if let Some(id) = self.jobs.enqueue(&job).await? {
                translation_jobs.push(id);
            }
        }

        info!(
            candidate_id = %external_id,
            score = ?adaptation_score,
            adaptable = ?adaptable,
            "Analysis stored"
        );
        Ok(AnalysisOutcome {
            analysis,
            adaptation_score,
            is_adaptable: adaptable,
            translation_jobs,
        })
    }

    /// Upload every asset, wait for activation, then prompt once with all files.
    /// Every handle that reached the provider is pushed to `uploaded`.
    async fn run_inference(
        &self,
        external_id: &str,
        media: &CandidateMedia,
        uploaded: &mut Vec<RemoteFile>,
    ) -> Result<String> {
        let policy = self
            .config
            .activation_timeout_policy(media.is_photo_post());

        for (index, url) in media.primary_urls().into_iter().enumerate() {
            let asset = self.downloader.download(url).await?;
            let mime = asset.content_type.clone().unwrap_or_else(|| {
                if media.is_photo_post() {
                    "image/jpeg".to_string()
                } else {
                    "video/mp4".to_string()
                }
            });
            let display_name = format!("{external_id}-{}", index + 1);
            let file = self
                .inference
                .upload_file(asset.data, &mime, &display_name)
                .await?;
            uploaded.push(file);
        }

        let mut ready = Vec::with_capacity(uploaded.len());
        for file in uploaded.iter() {
            ready.push(self.wait_until_active(file.clone(), policy).await?);
        }

        self.inference
            .generate(&analysis_prompt(media), &ready)
            .await
    }

    async fn wait_until_active(
        &self,
        mut file: RemoteFile,
        policy: ActivationTimeoutPolicy,
    ) -> Result<RemoteFile> {
        for attempt in 1..=self.config.file_poll_max_attempts {
            match file.state {
                FileState::Active => return Ok(file),
                FileState::Failed => {
                    return Err(Error::UploadFailed(format!(
                        "provider failed to process {}",
                        file.name
                    )));
                }
                FileState::Processing | FileState::Unspecified => {}
            }
            debug!(file = %file.name, attempt, "Waiting for file activation");
            tokio::time::sleep(self.config.file_poll_interval).await;
            file = self.inference.get_file(&file.name).await?;
        }

        if file.state == FileState::Active {
            return Ok(file);
        }
        match policy {
            ActivationTimeoutPolicy::Abort => Err(Error::ProcessingTimeout(file.name)),
            ActivationTimeoutPolicy::Proceed => {
                warn!(file = %file.name, state = ?file.state, "File not active after polling; proceeding");
                Ok(file)
            }
        }
    }

    async fn delete_remote_files(&self, external_id: &str, files: &[RemoteFile]) {
        for file in files {
            if let Err(e) = self.inference.delete_file(&file.name).await {
                warn!(candidate_id = %external_id, file = %file.name, error = %e, "Failed to delete remote file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PrimaryMedia;

    #[test]
    fn test_prompt_mentions_media_kind() {
        let video = CandidateMedia {
            primary: PrimaryMedia::Video { url: "v".into() },
            thumbnail_url: None,
            creator_avatar_url: None,
        };
        let prompt = analysis_prompt(&video);
        assert!(prompt.contains("attached video"));
        assert!(prompt.contains("\"adaptation_score\""));
        assert!(!prompt.contains("{media}"));

        let photos = CandidateMedia {
            primary: PrimaryMedia::PhotoSet { urls: vec!["a".into()] },
            ..video
        };
        assert!(analysis_prompt(&photos).contains("photo carousel"));
    }
}
