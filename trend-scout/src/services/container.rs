//! Service container for dependency injection.
//!
//! The ServiceContainer owns the repositories, providers and pipeline stages
//! and the lifecycle of the background scheduler.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::config::{AppConfig, PipelineConfig, ProviderConfig, SchedulerConfig};
use crate::database::repositories::{
    CandidateRepository, JobRepository, SqlxCandidateRepository, SqlxJobRepository,
};
use crate::pipeline::{
    AnalysisWorker, Discovery, FetchWorker, PipelineScheduler, QueueCoordinator, StaleJobReaper,
    TranslationWorker,
};
use crate::providers::http::build_client;
use crate::providers::{
    GeminiClient, GoogleTranslator, HttpDownloader, InferenceProvider, MediaDownloader,
    MediaResolver, ObjectStorage, RapidApiTrendingSource, SupabaseStorage, TextTranslator,
    TikwmResolver, TrendingSource,
};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// The external collaborators.
#[derive(Clone)]
pub struct Providers {
    pub trending: Arc<dyn TrendingSource>,
    pub resolver: Arc<dyn MediaResolver>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub storage: Arc<dyn ObjectStorage>,
    pub inference: Arc<dyn InferenceProvider>,
    pub translator: Arc<dyn TextTranslator>,
}

impl Providers {
    /// HTTP implementations sharing one client.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = build_client(config.request_timeout)?;
        Ok(Self {
            trending: Arc::new(RapidApiTrendingSource::new(
                client.clone(),
                &config.trending_url,
                &config.trending_host,
                &config.rapidapi_key,
                &config.trending_region,
            )),
            resolver: Arc::new(TikwmResolver::new(client.clone(), &config.resolver_url)),
            downloader: Arc::new(HttpDownloader::new(client.clone())),
            storage: Arc::new(SupabaseStorage::new(
                client.clone(),
                &config.storage_url,
                &config.storage_bucket,
                &config.storage_key,
            )),
            inference: Arc::new(GeminiClient::new(
                client.clone(),
                &config.gemini_base_url,
                &config.gemini_model,
                &config.gemini_api_key,
            )),
            translator: Arc::new(GoogleTranslator::new(
                client,
                &config.translate_url,
                &config.translate_api_key,
            )),
        })
    }
}

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: SqlitePool,
    pub candidates: Arc<dyn CandidateRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub discovery: Arc<Discovery>,
    pub fetch: Arc<FetchWorker>,
    pub analysis: Arc<AnalysisWorker>,
    pub translation: Arc<TranslationWorker>,
    pub coordinator: Arc<QueueCoordinator>,
    pub reaper: Arc<StaleJobReaper>,
    pub pipeline_config: PipelineConfig,
    scheduler: PipelineScheduler,
    background: Mutex<Vec<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build the container from process configuration with the HTTP providers.
    pub fn from_config(pool: SqlitePool, config: &AppConfig) -> Result<Self> {
        let providers = Providers::from_config(&config.providers)?;
        Ok(Self::new(
            pool,
            providers,
            config.pipeline.clone(),
            config.scheduler.clone(),
        ))
    }

    pub fn new(
        pool: SqlitePool,
        providers: Providers,
        pipeline: PipelineConfig,
        scheduler: SchedulerConfig,
    ) -> Self {
        let candidates: Arc<dyn CandidateRepository> =
            Arc::new(SqlxCandidateRepository::new(pool.clone()));
        let jobs: Arc<dyn JobRepository> = Arc::new(SqlxJobRepository::new(pool.clone()));
        let max_attempts = pipeline.default_max_attempts;

        let discovery = Arc::new(Discovery::new(
            providers.trending.clone(),
            candidates.clone(),
            jobs.clone(),
            max_attempts,
        ));
        let fetch = Arc::new(FetchWorker::new(
            candidates.clone(),
            jobs.clone(),
            providers.resolver.clone(),
            providers.downloader.clone(),
            providers.storage.clone(),
            max_attempts,
        ));
        let analysis = Arc::new(AnalysisWorker::new(
            candidates.clone(),
            jobs.clone(),
            providers.downloader.clone(),
            providers.inference.clone(),
            pipeline.clone(),
        ));
        let translation = Arc::new(TranslationWorker::new(
            candidates.clone(),
            providers.translator.clone(),
        ));
        let coordinator = Arc::new(QueueCoordinator::new(
            jobs.clone(),
            fetch.clone(),
            analysis.clone(),
            translation.clone(),
        ));
        let reaper = Arc::new(StaleJobReaper::new(
            jobs.clone(),
            candidates.clone(),
            pipeline.stale_job_timeout,
        ));
        let scheduler = PipelineScheduler::new(
            coordinator.clone(),
            reaper.clone(),
            discovery.clone(),
            jobs.clone(),
            scheduler,
            &pipeline,
        );

        Self {
            pool,
            candidates,
            jobs,
            discovery,
            fetch,
            analysis,
            translation,
            coordinator,
            reaper,
            pipeline_config: pipeline,
            scheduler,
            background: Mutex::new(Vec::new()),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start the background scheduler loops.
    pub async fn start_background(&self) {
        let handles = self.scheduler.start(self.cancellation_token.child_token());
        self.background.lock().await.extend(handles);
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);
        self.cancellation_token.cancel();

        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        let joined = tokio::time::timeout(timeout, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!("Shutdown timeout reached, forcing shutdown");
        }

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
        Ok(())
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
