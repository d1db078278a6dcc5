//! Plain HTTP media download.

use async_trait::async_trait;
use bytes::Bytes;

use super::http::ensure_success;
use crate::Result;

const SERVICE: &str = "media download";

#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub data: Bytes,
    /// `Content-Type` reported by the origin, without parameters.
    pub content_type: Option<String>,
}

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<DownloadedMedia>;
}

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<DownloadedMedia> {
        let response = ensure_success(SERVICE, self.client.get(url).send().await?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let data = response.bytes().await?;
        Ok(DownloadedMedia { data, content_type })
    }
}
