//! Trending-content discovery source.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::http::ensure_success;
use crate::domain::{CandidateDraft, CreatorInfo, EngagementStats, MusicInfo, Platform};
use crate::{Error, Result};

const SERVICE: &str = "trending api";

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag regex is valid"));

/// External feed of currently trending content.
#[async_trait]
pub trait TrendingSource: Send + Sync {
    /// One call to the feed, normalized into drafts. At most `limit` items.
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<CandidateDraft>>;
}

/// RapidAPI-hosted TikTok feed.
pub struct RapidApiTrendingSource {
    client: reqwest::Client,
    url: String,
    host: String,
    api_key: String,
    region: String,
}

impl RapidApiTrendingSource {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        host: impl Into<String>,
        api_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            host: host.into(),
            api_key: api_key.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl TrendingSource for RapidApiTrendingSource {
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<CandidateDraft>> {
        let count = limit.to_string();
        let response = self
            .client
            .get(&self.url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(&[("region", self.region.as_str()), ("count", count.as_str())])
            .send()
            .await?;
        let feed: FeedResponse = ensure_success(SERVICE, response).await?.json().await?;

        let mut drafts = feed.into_drafts()?;
        drafts.truncate(limit);
        debug!(count = drafts.len(), "Fetched trending feed");
        Ok(drafts)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(alias = "aweme_id")]
    video_id: Option<String>,
    title: Option<String>,
    cover: Option<String>,
    origin_cover: Option<String>,
    #[serde(default)]
    play_count: i64,
    #[serde(default)]
    digg_count: i64,
    #[serde(default)]
    comment_count: i64,
    #[serde(default)]
    share_count: i64,
    music_info: Option<FeedMusic>,
    author: Option<FeedAuthor>,
}

#[derive(Debug, Deserialize)]
struct FeedMusic {
    title: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedAuthor {
    unique_id: Option<String>,
    nickname: Option<String>,
    avatar: Option<String>,
    follower_count: Option<i64>,
}

impl FeedResponse {
    pub(crate) fn into_drafts(self) -> Result<Vec<CandidateDraft>> {
        if self.code != 0 {
            return Err(Error::upstream(
                SERVICE,
                200,
                self.msg.unwrap_or_else(|| format!("feed returned code {}", self.code)),
            ));
        }
        Ok(self.data.into_iter().filter_map(FeedItem::into_draft).collect())
    }
}

impl FeedItem {
    /// Items without an id cannot be deduplicated and are skipped.
    fn into_draft(self) -> Option<CandidateDraft> {
        let external_id = self.video_id.filter(|id| !id.trim().is_empty())?;
        let author = self.author;
        let handle = author.as_ref().and_then(|a| a.unique_id.clone());
        let source_url = format!(
            "https://www.tiktok.com/@{}/video/{}",
            handle.as_deref().unwrap_or("_"),
            external_id
        );
        let hashtags = self
            .title
            .as_deref()
            .map(extract_hashtags)
            .unwrap_or_default();

        Some(CandidateDraft {
            external_id,
            platform: Platform::TikTok,
            source_url,
            title: self.title.clone(),
            description: self.title,
            stats: EngagementStats {
                views: self.play_count,
                likes: self.digg_count,
                comments: self.comment_count,
                shares: self.share_count,
            },
            creator: CreatorInfo {
                handle,
                name: author.as_ref().and_then(|a| a.nickname.clone()),
                followers: author.as_ref().and_then(|a| a.follower_count),
                avatar_url: author.and_then(|a| a.avatar),
            },
            music: self.music_info.map(|m| MusicInfo {
                title: m.title,
                author: m.author,
            }),
            hashtags,
            thumbnail_source_url: self.origin_cover.or(self.cover),
        })
    }
}

/// Distinct hashtags in order of first appearance, without the `#`.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for cap in HASHTAG.captures_iter(text) {
        let tag = cap[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_mapping() {
        let feed: FeedResponse = serde_json::from_value(serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": [
                {
                    "video_id": "123",
                    "title": "Wait for it #fyp #Dance #fyp",
                    "cover": "https://p16/cover.jpg",
                    "play_count": 1000,
                    "digg_count": 100,
                    "comment_count": 10,
                    "share_count": 1,
                    "music_info": {"title": "original sound", "author": "dj"},
                    "author": {"unique_id": "creator", "nickname": "Creator", "avatar": "https://p16/a.jpg"}
                },
                {"title": "no id"}
            ]
        }))
        .unwrap();

        let drafts = feed.into_drafts().unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.external_id, "123");
        assert_eq!(draft.platform, Platform::TikTok);
        assert_eq!(draft.source_url, "https://www.tiktok.com/@creator/video/123");
        assert_eq!(draft.stats.views, 1000);
        assert_eq!(draft.hashtags, vec!["fyp".to_string(), "dance".to_string()]);
        assert_eq!(draft.thumbnail_source_url.as_deref(), Some("https://p16/cover.jpg"));
        assert_eq!(draft.creator.avatar_url.as_deref(), Some("https://p16/a.jpg"));
        assert_eq!(draft.music.as_ref().unwrap().author.as_deref(), Some("dj"));
    }

    #[test]
    fn test_feed_error_code() {
        let feed: FeedResponse =
            serde_json::from_str(r#"{"code": -1, "msg": "quota exceeded"}"#).unwrap();
        let err = feed.into_drafts().unwrap_err();
        assert!(matches!(err, Error::Upstream { message, .. } if message == "quota exceeded"));
    }
}
