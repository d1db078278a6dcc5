//! Candidate entity: a discovered piece of trending content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source platform of a candidate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Media ingestion status of a candidate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Discovered, media not fetched yet.
    Pending,
    /// Fetch worker is re-hosting the media.
    Processing,
    /// Primary media is re-hosted.
    Completed,
    /// Fetch failed; see `processing_error`.
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Engagement counters at discovery time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStats {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    pub handle: Option<String>,
    pub name: Option<String>,
    pub followers: Option<i64>,
    /// Avatar URL on the source platform.
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicInfo {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// A normalized discovery result, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDraft {
    pub external_id: String,
    pub platform: Platform,
    pub source_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stats: EngagementStats,
    pub creator: CreatorInfo,
    pub music: Option<MusicInfo>,
    pub hashtags: Vec<String>,
    /// Cover image on the source platform.
    pub thumbnail_source_url: Option<String>,
}

/// The primary re-hosted content of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PrimaryMedia {
    Video { url: String },
    /// Ordered image URLs. May be shorter than the source photo-set when
    /// individual images failed to re-host.
    PhotoSet { urls: Vec<String> },
}

/// Re-hosted media. Only present on candidates whose fetch completed.
///
/// Thumbnail and avatar are best-effort and stay `None` when re-hosting them failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMedia {
    pub primary: PrimaryMedia,
    pub thumbnail_url: Option<String>,
    pub creator_avatar_url: Option<String>,
}

impl CandidateMedia {
    pub fn is_photo_post(&self) -> bool {
        matches!(self.primary, PrimaryMedia::PhotoSet { .. })
    }

    /// Primary media URLs in order; empty means nothing usable.
    pub fn primary_urls(&self) -> Vec<&str> {
        match &self.primary {
            PrimaryMedia::Video { url } => vec![url.as_str()],
            PrimaryMedia::PhotoSet { urls } => urls.iter().map(String::as_str).collect(),
        }
    }
}

/// A persisted candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub external_id: String,
    pub platform: Platform,
    pub source_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stats: EngagementStats,
    pub creator: CreatorInfo,
    pub music: Option<MusicInfo>,
    pub hashtags: Vec<String>,
    pub thumbnail_source_url: Option<String>,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub media: Option<CandidateMedia>,
    pub gemini_analysis: Option<serde_json::Value>,
    pub analysis_en: Option<serde_json::Value>,
    pub analysis_de: Option<serde_json::Value>,
    pub adaptation_score: Option<f64>,
    pub is_adaptable: Option<bool>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// Media usable by the analysis stage, if any.
    pub fn analyzable_media(&self) -> Option<&CandidateMedia> {
        self.media
            .as_ref()
            .filter(|_| self.processing_status == ProcessingStatus::Completed)
            .filter(|m| !m.primary_urls().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_platform_strings() {
        assert_eq!(Platform::TikTok.as_str(), "tiktok");
        assert_eq!(Platform::from_str("instagram").unwrap(), Platform::Instagram);
        assert_eq!(
            serde_json::to_string(&Platform::TikTok).unwrap(),
            "\"tiktok\""
        );
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(ProcessingStatus::Completed.as_str(), "completed");
        assert_eq!(
            ProcessingStatus::from_str("processing").unwrap(),
            ProcessingStatus::Processing
        );
    }

    #[test]
    fn test_media_primary_urls() {
        let media = CandidateMedia {
            primary: PrimaryMedia::PhotoSet {
                urls: vec!["a".into(), "b".into()],
            },
            thumbnail_url: None,
            creator_avatar_url: None,
        };
        assert!(media.is_photo_post());
        assert_eq!(media.primary_urls(), vec!["a", "b"]);

        let empty = CandidateMedia {
            primary: PrimaryMedia::PhotoSet { urls: vec![] },
            thumbnail_url: None,
            creator_avatar_url: None,
        };
        assert!(empty.primary_urls().is_empty());
    }
}
