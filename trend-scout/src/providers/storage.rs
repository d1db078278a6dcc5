//! Durable object storage for re-hosted media.

use async_trait::async_trait;
use bytes::Bytes;

use super::http::ensure_success;
use crate::Result;
use crate::domain::Platform;

const SERVICE: &str = "object storage";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;
}

/// Supabase-compatible storage REST API.
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            service_key: service_key.into(),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await?;
        ensure_success(SERVICE, response).await?;
        Ok(self.public_url(key))
    }
}

/// What a stored object is for; part of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MediaPurpose {
    Video,
    Image,
    Thumbnail,
    Avatar,
}

/// `{platform}-{externalId}-{purpose}-{timestamp}.{ext}`.
///
/// Photo-set images carry their position in the purpose segment (`image1`, ...).
pub fn storage_key(
    platform: Platform,
    external_id: &str,
    purpose: MediaPurpose,
    index: Option<usize>,
    timestamp_ms: i64,
    ext: &str,
) -> String {
    let purpose: &'static str = purpose.into();
    let purpose = match index {
        Some(i) => format!("{purpose}{}", i + 1),
        None => purpose.to_string(),
    };
    let safe_id: String = external_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!(
        "{}-{}-{}-{}.{}",
        platform.as_str(),
        safe_id,
        purpose,
        timestamp_ms,
        ext
    )
}

/// File extension and content type for an upload, from the origin's content type.
pub fn media_format(content_type: Option<&str>, purpose: MediaPurpose) -> (&'static str, &'static str) {
    match content_type {
        Some("video/mp4") => ("mp4", "video/mp4"),
        Some("video/webm") => ("webm", "video/webm"),
        Some("video/quicktime") => ("mov", "video/quicktime"),
        Some("image/jpeg") | Some("image/jpg") => ("jpg", "image/jpeg"),
        Some("image/png") => ("png", "image/png"),
        Some("image/webp") => ("webp", "image/webp"),
        Some("image/heic") => ("heic", "image/heic"),
        _ => match purpose {
            MediaPurpose::Video => ("mp4", "video/mp4"),
            _ => ("jpg", "image/jpeg"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        assert_eq!(
            storage_key(Platform::TikTok, "123", MediaPurpose::Video, None, 1_700_000_000_000, "mp4"),
            "tiktok-123-video-1700000000000.mp4"
        );
        assert_eq!(
            storage_key(Platform::Instagram, "a/b", MediaPurpose::Image, Some(1), 5, "jpg"),
            "instagram-a_b-image2-5.jpg"
        );
    }

    #[test]
    fn test_media_format_fallbacks() {
        assert_eq!(media_format(Some("image/webp"), MediaPurpose::Image), ("webp", "image/webp"));
        assert_eq!(media_format(None, MediaPurpose::Video), ("mp4", "video/mp4"));
        assert_eq!(
            media_format(Some("application/octet-stream"), MediaPurpose::Avatar),
            ("jpg", "image/jpeg")
        );
    }

    #[test]
    fn test_public_url() {
        crate::providers::http::install_rustls_provider();
        let storage = SupabaseStorage::new(reqwest::Client::new(), "https://x.supabase.co/", "media", "k");
        assert_eq!(
            storage.public_url("tiktok-1-video-2.mp4"),
            "https://x.supabase.co/storage/v1/object/public/media/tiktok-1-video-2.mp4"
        );
    }
}
