//! Candidate database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::database::time::{ms_to_datetime, now_ms};
use crate::domain::{
    Candidate, CandidateDraft, CandidateMedia, CreatorInfo, EngagementStats, MusicInfo, Platform,
    PrimaryMedia, ProcessingStatus,
};
use crate::utils::json::{self, JsonContext};
use crate::{Error, Result};

/// Candidate database model, one row of `candidates`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CandidateDbModel {
    /// Platform video id; primary key.
    pub external_id: String,
    /// `tiktok` or `instagram`
    pub platform: String,
    pub source_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub creator_handle: Option<String>,
    pub creator_name: Option<String>,
    pub creator_followers: Option<i64>,
    pub creator_avatar_source_url: Option<String>,
    pub music_title: Option<String>,
    pub music_author: Option<String>,
    /// JSON array of hashtags
    pub hashtags: String,
    pub thumbnail_source_url: Option<String>,
    pub is_photo_post: bool,
    pub video_url: Option<String>,
    /// JSON array of re-hosted image URLs
    pub image_urls: Option<String>,
    pub thumbnail_url: Option<String>,
    pub creator_avatar_url: Option<String>,
    /// Status: pending, processing, completed, failed
    pub processing_status: String,
    pub processing_error: Option<String>,
    /// JSON analysis in the source language
    pub gemini_analysis: Option<String>,
    pub analysis_en: Option<String>,
    pub analysis_de: Option<String>,
    pub adaptation_score: Option<f64>,
    pub is_adaptable: Option<bool>,
    pub analyzed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CandidateDbModel {
    /// Build a fresh `pending` row from a discovery draft.
    pub fn from_draft(draft: &CandidateDraft) -> Result<Self> {
        let now = now_ms();
        let music = draft.music.clone().unwrap_or_default();
        Ok(Self {
            external_id: draft.external_id.clone(),
            platform: draft.platform.as_str().to_string(),
            source_url: draft.source_url.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            view_count: draft.stats.views,
            like_count: draft.stats.likes,
            comment_count: draft.stats.comments,
            share_count: draft.stats.shares,
            creator_handle: draft.creator.handle.clone(),
            creator_name: draft.creator.name.clone(),
            creator_followers: draft.creator.followers,
            creator_avatar_source_url: draft.creator.avatar_url.clone(),
            music_title: music.title,
            music_author: music.author,
            hashtags: serde_json::to_string(&draft.hashtags)?,
            thumbnail_source_url: draft.thumbnail_source_url.clone(),
            is_photo_post: false,
            video_url: None,
            image_urls: None,
            thumbnail_url: None,
            creator_avatar_url: None,
            processing_status: ProcessingStatus::Pending.as_str().to_string(),
            processing_error: None,
            gemini_analysis: None,
            analysis_en: None,
            analysis_de: None,
            adaptation_score: None,
            is_adaptable: None,
            analyzed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> Result<ProcessingStatus> {
        ProcessingStatus::from_str(&self.processing_status).map_err(|_| {
            Error::Database(format!(
                "candidate {} has unknown processing_status '{}'",
                self.external_id, self.processing_status
            ))
        })
    }

    /// Re-hosted media; `None` unless the fetch completed with usable primary media.
    fn media(&self, status: ProcessingStatus) -> Option<CandidateMedia> {
        if status != ProcessingStatus::Completed {
            return None;
        }

        let primary = if self.is_photo_post {
            let urls: Vec<String> = json::parse_optional_or_default(
                self.image_urls.as_deref(),
                JsonContext::CandidateField {
                    candidate_id: &self.external_id,
                    field: "image_urls",
                },
                "Invalid image_urls JSON; treating as empty",
            );
            if urls.is_empty() {
                return None;
            }
            PrimaryMedia::PhotoSet { urls }
        } else {
            PrimaryMedia::Video {
                url: self.video_url.clone()?,
            }
        };

        Some(CandidateMedia {
            primary,
            thumbnail_url: self.thumbnail_url.clone(),
            creator_avatar_url: self.creator_avatar_url.clone(),
        })
    }

    pub fn into_domain(self) -> Result<Candidate> {
        let status = self.status()?;
        let platform = Platform::from_str(&self.platform).map_err(|_| {
            Error::Database(format!(
                "candidate {} has unknown platform '{}'",
                self.external_id, self.platform
            ))
        })?;
        let media = self.media(status);

        let ctx = |field| JsonContext::CandidateField {
            candidate_id: &self.external_id,
            field,
        };
        let hashtags: Vec<String> = json::parse_or_default(
            &self.hashtags,
            ctx("hashtags"),
            "Invalid hashtags JSON; treating as empty",
        );
        let gemini_analysis = json::parse_optional(
            self.gemini_analysis.as_deref(),
            ctx("gemini_analysis"),
            "Invalid gemini_analysis JSON; omitting",
        );
        let analysis_en = json::parse_optional(
            self.analysis_en.as_deref(),
            ctx("analysis_en"),
            "Invalid analysis_en JSON; omitting",
        );
        let analysis_de = json::parse_optional(
            self.analysis_de.as_deref(),
            ctx("analysis_de"),
            "Invalid analysis_de JSON; omitting",
        );

        let music = (self.music_title.is_some() || self.music_author.is_some()).then(|| {
            MusicInfo {
                title: self.music_title.clone(),
                author: self.music_author.clone(),
            }
        });

        Ok(Candidate {
            platform,
            source_url: self.source_url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            stats: EngagementStats {
                views: self.view_count,
                likes: self.like_count,
                comments: self.comment_count,
                shares: self.share_count,
            },
            creator: CreatorInfo {
                handle: self.creator_handle.clone(),
                name: self.creator_name.clone(),
                followers: self.creator_followers,
                avatar_url: self.creator_avatar_source_url.clone(),
            },
            music,
            hashtags,
            thumbnail_source_url: self.thumbnail_source_url.clone(),
            processing_status: status,
            processing_error: self.processing_error.clone(),
            media,
            gemini_analysis,
            analysis_en,
            analysis_de,
            adaptation_score: self.adaptation_score,
            is_adaptable: self.is_adaptable,
            analyzed_at: self.analyzed_at.map(ms_to_datetime),
            created_at: ms_to_datetime(self.created_at),
            updated_at: ms_to_datetime(self.updated_at),
            external_id: self.external_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> CandidateDraft {
        CandidateDraft {
            external_id: "123".to_string(),
            platform: Platform::TikTok,
            source_url: "https://www.tiktok.com/@a/video/123".to_string(),
            title: Some("title".to_string()),
            description: None,
            stats: EngagementStats {
                views: 10,
                likes: 5,
                comments: 1,
                shares: 0,
            },
            creator: CreatorInfo::default(),
            music: None,
            hashtags: vec!["fyp".to_string()],
            thumbnail_source_url: None,
        }
    }

    #[test]
    fn test_from_draft_is_pending_without_media() {
        let row = CandidateDbModel::from_draft(&draft()).unwrap();
        assert_eq!(row.processing_status, "pending");
        assert_eq!(row.hashtags, r#"["fyp"]"#);

        let candidate = row.into_domain().unwrap();
        assert_eq!(candidate.processing_status, ProcessingStatus::Pending);
        assert!(candidate.media.is_none());
        assert!(candidate.music.is_none());
        assert_eq!(candidate.hashtags, vec!["fyp".to_string()]);
    }

    #[test]
    fn test_media_requires_completed_status() {
        let mut row = CandidateDbModel::from_draft(&draft()).unwrap();
        row.video_url = Some("https://cdn/video.mp4".to_string());
        row.processing_status = "failed".to_string();
        assert!(row.clone().into_domain().unwrap().media.is_none());

        row.processing_status = "completed".to_string();
        let media = row.into_domain().unwrap().media.unwrap();
        assert_eq!(
            media.primary,
            PrimaryMedia::Video {
                url: "https://cdn/video.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_empty_photo_set_is_not_media() {
        let mut row = CandidateDbModel::from_draft(&draft()).unwrap();
        row.processing_status = "completed".to_string();
        row.is_photo_post = true;
        row.image_urls = Some("[]".to_string());
        assert!(row.into_domain().unwrap().media.is_none());
    }
}
