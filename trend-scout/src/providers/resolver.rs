//! Direct-media lookup for a source post URL.

use async_trait::async_trait;
use serde::Deserialize;

use super::http::ensure_success;
use crate::domain::PrimaryMedia;
use crate::{Error, Result};

const SERVICE: &str = "media resolver";

/// Downloadable source URLs for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaManifest {
    /// Source URLs of the video or of each image, in order.
    pub primary: PrimaryMedia,
    pub thumbnail_url: Option<String>,
    pub creator_avatar_url: Option<String>,
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> Result<MediaManifest>;
}

/// tikwm-style resolver: `GET {base}?url=<post>&hd=1`.
pub struct TikwmResolver {
    client: reqwest::Client,
    base_url: String,
}

impl TikwmResolver {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MediaResolver for TikwmResolver {
    async fn resolve(&self, source_url: &str) -> Result<MediaManifest> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("url", source_url), ("hd", "1")])
            .send()
            .await?;
        let body: ResolverResponse = ensure_success(SERVICE, response).await?.json().await?;
        body.into_manifest()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolverResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<ResolverData>,
}

#[derive(Debug, Deserialize)]
struct ResolverData {
    play: Option<String>,
    hdplay: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    cover: Option<String>,
    origin_cover: Option<String>,
    author: Option<ResolverAuthor>,
}

#[derive(Debug, Deserialize)]
struct ResolverAuthor {
    avatar: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ResolverResponse {
    pub(crate) fn into_manifest(self) -> Result<MediaManifest> {
        if self.code != 0 {
            return Err(Error::upstream(
                SERVICE,
                200,
                self.msg
                    .unwrap_or_else(|| format!("resolver returned code {}", self.code)),
            ));
        }
        let data = self
            .data
            .ok_or_else(|| Error::upstream(SERVICE, 200, "response has no data"))?;

        let images: Vec<String> = data
            .images
            .into_iter()
            .filter(|u| !u.trim().is_empty())
            .collect();
        let primary = if !images.is_empty() {
            PrimaryMedia::PhotoSet { urls: images }
        } else {
            let url = non_empty(data.hdplay)
                .or_else(|| non_empty(data.play))
                .ok_or_else(|| Error::upstream(SERVICE, 200, "no downloadable media in response"))?;
            PrimaryMedia::Video { url }
        };

        Ok(MediaManifest {
            primary,
            thumbnail_url: non_empty(data.origin_cover).or_else(|| non_empty(data.cover)),
            creator_avatar_url: data.author.and_then(|a| non_empty(a.avatar)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> Result<MediaManifest> {
        serde_json::from_value::<ResolverResponse>(value)
            .unwrap()
            .into_manifest()
    }

    #[test]
    fn test_video_manifest_prefers_hd() {
        let manifest = parse(serde_json::json!({
            "code": 0,
            "data": {
                "play": "https://cdn/play.mp4",
                "hdplay": "https://cdn/hd.mp4",
                "cover": "https://cdn/cover.jpg",
                "author": {"avatar": "https://cdn/avatar.jpg"}
            }
        }))
        .unwrap();
        assert_eq!(
            manifest.primary,
            PrimaryMedia::Video {
                url: "https://cdn/hd.mp4".into()
            }
        );
        assert_eq!(manifest.thumbnail_url.as_deref(), Some("https://cdn/cover.jpg"));
        assert_eq!(
            manifest.creator_avatar_url.as_deref(),
            Some("https://cdn/avatar.jpg")
        );
    }

    #[test]
    fn test_images_make_a_photo_set() {
        let manifest = parse(serde_json::json!({
            "code": 0,
            "data": {
                "play": "https://cdn/music.mp3",
                "images": ["https://cdn/1.jpg", "", "https://cdn/2.jpg"]
            }
        }))
        .unwrap();
        assert_eq!(
            manifest.primary,
            PrimaryMedia::PhotoSet {
                urls: vec!["https://cdn/1.jpg".into(), "https://cdn/2.jpg".into()]
            }
        );
        assert!(manifest.creator_avatar_url.is_none());
    }

    #[test]
    fn test_error_and_empty_responses() {
        assert!(matches!(
            parse(serde_json::json!({"code": -1, "msg": "Url parsing is failed!"})),
            Err(Error::Upstream { .. })
        ));
        assert!(matches!(
            parse(serde_json::json!({"code": 0, "data": {"play": ""}})),
            Err(Error::Upstream { .. })
        ));
    }
}
