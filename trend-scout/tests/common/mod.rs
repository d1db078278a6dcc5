//! In-memory providers and a container wired to an in-memory database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use trend_scout::config::{PipelineConfig, SchedulerConfig};
use trend_scout::database::{init_pool_with_size, run_migrations};
use trend_scout::domain::{
    CandidateDraft, CreatorInfo, EngagementStats, Platform, PrimaryMedia, TargetLanguage,
};
use trend_scout::providers::{
    DownloadedMedia, FileState, InferenceProvider, MediaDownloader, MediaManifest, MediaResolver,
    ObjectStorage, RemoteFile, TextTranslator, TrendingSource,
};
use trend_scout::services::{Providers, ServiceContainer};
use trend_scout::{Error, Result};

pub const CDN: &str = "https://cdn.test";

pub fn draft(external_id: &str) -> CandidateDraft {
    CandidateDraft {
        external_id: external_id.to_string(),
        platform: Platform::TikTok,
        source_url: format!("https://www.tiktok.com/@creator/video/{external_id}"),
        title: Some(format!("clip {external_id}")),
        description: Some("#dance #fyp".to_string()),
        stats: EngagementStats {
            views: 1_000,
            likes: 100,
            comments: 10,
            shares: 1,
        },
        creator: CreatorInfo {
            handle: Some("creator".to_string()),
            name: Some("Creator".to_string()),
            followers: Some(5_000),
            avatar_url: Some("https://origin.test/avatar.jpg".to_string()),
        },
        music: None,
        hashtags: vec!["dance".to_string(), "fyp".to_string()],
        thumbnail_source_url: Some("https://origin.test/cover.jpg".to_string()),
    }
}

#[derive(Default)]
pub struct FakeTrending {
    pub drafts: Mutex<Vec<CandidateDraft>>,
}

#[async_trait]
impl TrendingSource for FakeTrending {
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<CandidateDraft>> {
        let drafts = self.drafts.lock().unwrap();
        Ok(drafts.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub manifests: Mutex<HashMap<String, MediaManifest>>,
}

impl FakeResolver {
    pub fn video(&self, source_url: &str, video_url: &str) {
        self.manifests.lock().unwrap().insert(
            source_url.to_string(),
            MediaManifest {
                primary: PrimaryMedia::Video {
                    url: video_url.to_string(),
                },
                thumbnail_url: None,
                creator_avatar_url: None,
            },
        );
    }

    pub fn photos(&self, source_url: &str, image_urls: &[&str]) {
        self.manifests.lock().unwrap().insert(
            source_url.to_string(),
            MediaManifest {
                primary: PrimaryMedia::PhotoSet {
                    urls: image_urls.iter().map(|u| u.to_string()).collect(),
                },
                thumbnail_url: None,
                creator_avatar_url: None,
            },
        );
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, source_url: &str) -> Result<MediaManifest> {
        self.manifests
            .lock()
            .unwrap()
            .get(source_url)
            .cloned()
            .ok_or_else(|| Error::upstream("media resolver", 404, "unknown post"))
    }
}

/// Serves registered URLs and answers 404 for everything else.
#[derive(Default)]
pub struct FakeDownloader {
    pub files: Mutex<HashMap<String, (Bytes, Option<String>)>>,
}

impl FakeDownloader {
    pub fn serve(&self, url: &str, content_type: &str) {
        self.files.lock().unwrap().insert(
            url.to_string(),
            (
                Bytes::from(format!("bytes of {url}")),
                Some(content_type.to_string()),
            ),
        );
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, url: &str) -> Result<DownloadedMedia> {
        let files = self.files.lock().unwrap();
        match files.get(url) {
            Some((data, content_type)) => Ok(DownloadedMedia {
                data: data.clone(),
                content_type: content_type.clone(),
            }),
            // Re-hosted objects are downloadable too.
            None if url.starts_with(CDN) => Ok(DownloadedMedia {
                data: Bytes::from_static(b"stored"),
                content_type: None,
            }),
            None => Err(Error::upstream("media download", 404, "not found")),
        }
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, key: &str, _data: Bytes, _content_type: &str) -> Result<String> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("{CDN}/{key}"))
    }
}

pub struct FakeInference {
    /// State reported on upload and on every poll.
    pub state: Mutex<FileState>,
    pub output: Mutex<String>,
    pub uploads: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<(String, usize)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl Default for FakeInference {
    fn default() -> Self {
        Self {
            state: Mutex::new(FileState::Active),
            output: Mutex::new(regular_analysis_json(8.0)),
            uploads: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeInference {
    fn file(&self, name: &str) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            uri: format!("https://files.test/{name}"),
            mime_type: "video/mp4".to_string(),
            state: *self.state.lock().unwrap(),
        }
    }
}

#[async_trait]
impl InferenceProvider for FakeInference {
    async fn upload_file(
        &self,
        _data: Bytes,
        _mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        let name = format!("files/{display_name}");
        self.uploads.lock().unwrap().push(name.clone());
        Ok(self.file(&name))
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        Ok(self.file(name))
    }

    async fn generate(&self, prompt: &str, files: &[RemoteFile]) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), files.len()));
        Ok(self.output.lock().unwrap().clone())
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Prefixes every field with the language code.
#[derive(Default)]
pub struct FakeTranslator {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl TextTranslator for FakeTranslator {
    async fn translate(&self, text: &str, target: TargetLanguage) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(format!("[{}] {text}", target.code()))
    }
}

pub fn regular_analysis_json(score: f64) -> String {
    serde_json::json!({
        "adaptation_score": score,
        "original_mechanic": "Creator lip-syncs a duet with a cat",
        "why_viral": "Unexpected pet timing",
        "reapplication": {
            "target_topics": ["music release"],
            "production_needs": ["a pet"],
            "engagement_factors": ["rewatch for the timing"],
            "shot_list_template": [
                {"shot": 1, "description": "Wide shot", "on_screen_text": "wait for it"}
            ]
        }
    })
    .to_string()
}

pub struct Harness {
    pub services: Arc<ServiceContainer>,
    pub trending: Arc<FakeTrending>,
    pub resolver: Arc<FakeResolver>,
    pub downloader: Arc<FakeDownloader>,
    pub storage: Arc<FakeStorage>,
    pub inference: Arc<FakeInference>,
    pub translator: Arc<FakeTranslator>,
}

pub fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        file_poll_interval: Duration::ZERO,
        file_poll_max_attempts: 3,
        ..PipelineConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(fast_pipeline_config()).await
}

pub async fn harness_with(pipeline: PipelineConfig) -> Harness {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let trending = Arc::new(FakeTrending::default());
    let resolver = Arc::new(FakeResolver::default());
    let downloader = Arc::new(FakeDownloader::default());
    let storage = Arc::new(FakeStorage::default());
    let inference = Arc::new(FakeInference::default());
    let translator = Arc::new(FakeTranslator::default());

    let providers = Providers {
        trending: trending.clone(),
        resolver: resolver.clone(),
        downloader: downloader.clone(),
        storage: storage.clone(),
        inference: inference.clone(),
        translator: translator.clone(),
    };
    let scheduler = SchedulerConfig {
        enabled: false,
        ..SchedulerConfig::default()
    };

    Harness {
        services: Arc::new(ServiceContainer::new(pool, providers, pipeline, scheduler)),
        trending,
        resolver,
        downloader,
        storage,
        inference,
        translator,
    }
}

impl Harness {
    /// Register a discoverable video post whose media is downloadable.
    pub fn video_post(&self, external_id: &str) -> CandidateDraft {
        let draft = draft(external_id);
        let video = format!("https://origin.test/{external_id}.mp4");
        self.resolver.video(&draft.source_url, &video);
        self.downloader.serve(&video, "video/mp4");
        self.downloader
            .serve("https://origin.test/cover.jpg", "image/jpeg");
        self.downloader
            .serve("https://origin.test/avatar.jpg", "image/jpeg");
        self.trending.drafts.lock().unwrap().push(draft.clone());
        draft
    }
}
