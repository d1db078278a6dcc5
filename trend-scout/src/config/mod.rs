//! Process configuration.
//!
//! Everything is read once from the environment in `main` and handed to the
//! components that need it. Business logic never reads the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::api::server::ApiServerConfig;
use crate::domain::TargetLanguage;
use crate::{Error, Result};

/// Raw key/value source, usually the process environment.
pub struct EnvSource<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvSource<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    /// Non-empty, trimmed value.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("{key} must be set")))
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::config(format!("invalid {key} '{raw}': {e}"))),
            None => Ok(default),
        }
    }

    pub fn secs(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get(key) {
            Some(_) => Ok(Duration::from_secs(self.parse(key, 0u64)?)),
            None => Ok(default),
        }
    }

    pub fn optional_secs(&self, key: &str) -> Result<Option<Duration>> {
        match self.get(key) {
            Some(_) => {
                let secs: u64 = self.parse(key, 0)?;
                Ok((secs > 0).then(|| Duration::from_secs(secs)))
            }
            None => Ok(None),
        }
    }

    /// Comma-separated list; empty entries are dropped.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// What to do when an uploaded file never reaches ACTIVE within the poll budget.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ActivationTimeoutPolicy {
    /// Fail the analysis with `ProcessingTimeout`.
    Abort,
    /// Log and run inference anyway.
    Proceed,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        Ok(Self {
            url: env.string("DATABASE_URL", "sqlite://trend-scout.db"),
            max_connections: env.parse(
                "DATABASE_MAX_CONNECTIONS",
                crate::database::default_pool_size(),
            )?,
        })
    }
}

/// Tunables for the pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scores at or above this are adaptable.
    pub adaptability_threshold: f64,
    /// Processing jobs older than this are reaped.
    pub stale_job_timeout: Duration,
    pub file_poll_interval: Duration,
    pub file_poll_max_attempts: u32,
    pub video_activation_timeout: ActivationTimeoutPolicy,
    pub photo_activation_timeout: ActivationTimeoutPolicy,
    pub default_max_attempts: i64,
    /// Languages a finished analysis is translated into.
    pub follow_up_languages: Vec<TargetLanguage>,
    pub discovery_limit: usize,
    pub job_retention_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            adaptability_threshold: 7.0,
            stale_job_timeout: Duration::from_secs(10 * 60),
            file_poll_interval: Duration::from_secs(3),
            file_poll_max_attempts: 60,
            video_activation_timeout: ActivationTimeoutPolicy::Abort,
            photo_activation_timeout: ActivationTimeoutPolicy::Proceed,
            default_max_attempts: 3,
            follow_up_languages: vec![TargetLanguage::En],
            discovery_limit: 20,
            job_retention_days: 30,
        }
    }
}

impl PipelineConfig {
    fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        let defaults = Self::default();

        let follow_up_languages = match env.list("FOLLOW_UP_LANGUAGES") {
            Some(langs) => langs
                .iter()
                .map(|l| {
                    TargetLanguage::from_str(l).map_err(|_| {
                        Error::config(format!("unsupported language '{l}' in FOLLOW_UP_LANGUAGES"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.follow_up_languages,
        };

        let config = Self {
            adaptability_threshold: env
                .parse("ADAPTABILITY_THRESHOLD", defaults.adaptability_threshold)?,
            stale_job_timeout: env.secs("STALE_JOB_TIMEOUT_SECS", defaults.stale_job_timeout)?,
            file_poll_interval: env.secs("FILE_POLL_INTERVAL_SECS", defaults.file_poll_interval)?,
            file_poll_max_attempts: env
                .parse("FILE_POLL_MAX_ATTEMPTS", defaults.file_poll_max_attempts)?,
            video_activation_timeout: env
                .parse("VIDEO_ACTIVATION_TIMEOUT", defaults.video_activation_timeout)?,
            photo_activation_timeout: env
                .parse("PHOTO_ACTIVATION_TIMEOUT", defaults.photo_activation_timeout)?,
            default_max_attempts: env.parse("JOB_MAX_ATTEMPTS", defaults.default_max_attempts)?,
            follow_up_languages,
            discovery_limit: env.parse("DISCOVERY_LIMIT", defaults.discovery_limit)?,
            job_retention_days: env.parse("JOB_RETENTION_DAYS", defaults.job_retention_days)?,
        };

        if !(0.0..=10.0).contains(&config.adaptability_threshold) {
            return Err(Error::config("ADAPTABILITY_THRESHOLD must be within 0..=10"));
        }
        if config.default_max_attempts < 1 {
            return Err(Error::config("JOB_MAX_ATTEMPTS must be at least 1"));
        }
        if config.file_poll_max_attempts == 0 {
            return Err(Error::config("FILE_POLL_MAX_ATTEMPTS must be at least 1"));
        }
        // A zero timeout reaps every running job; a zero poll spins the file API.
        for (name, duration) in [
            ("STALE_JOB_TIMEOUT_SECS", config.stale_job_timeout),
            ("FILE_POLL_INTERVAL_SECS", config.file_poll_interval),
        ] {
            if duration.is_zero() {
                return Err(Error::config(format!("{name} must be greater than 0")));
            }
        }
        Ok(config)
    }

    pub fn activation_timeout_policy(&self, is_photo_post: bool) -> ActivationTimeoutPolicy {
        if is_photo_post {
            self.photo_activation_timeout
        } else {
            self.video_activation_timeout
        }
    }
}

/// Endpoints and credentials of the external collaborators.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub request_timeout: Duration,
    pub trending_url: String,
    pub trending_host: String,
    pub trending_region: String,
    pub rapidapi_key: String,
    pub resolver_url: String,
    pub storage_url: String,
    pub storage_bucket: String,
    pub storage_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_api_key: String,
    pub translate_url: String,
    pub translate_api_key: String,
}

impl ProviderConfig {
    fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        let trending_url = env.string(
            "TRENDING_API_URL",
            "https://tiktok-scraper7.p.rapidapi.com/feed/list",
        );
        let trending_host = match env.get("TRENDING_API_HOST") {
            Some(host) => host,
            None => url::Url::parse(&trending_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .ok_or_else(|| Error::config("TRENDING_API_URL has no host"))?,
        };

        Ok(Self {
            request_timeout: env.secs("HTTP_TIMEOUT_SECS", Duration::from_secs(60))?,
            trending_url,
            trending_host,
            trending_region: env.string("TRENDING_REGION", "US"),
            rapidapi_key: env.required("RAPIDAPI_KEY")?,
            resolver_url: env.string("MEDIA_RESOLVER_URL", "https://www.tikwm.com/api/"),
            storage_url: env.required("STORAGE_URL")?,
            storage_bucket: env.string("STORAGE_BUCKET", "trend-media"),
            storage_key: env.required("STORAGE_SERVICE_KEY")?,
            gemini_base_url: env.string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_model: env.string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_api_key: env.required("GEMINI_API_KEY")?,
            translate_url: env.string(
                "GOOGLE_TRANSLATE_URL",
                "https://translation.googleapis.com/language/translate/v2",
            ),
            translate_api_key: env.required("GOOGLE_TRANSLATE_API_KEY")?,
        })
    }
}

/// Background driver intervals.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval: Duration,
    pub reap_interval: Duration,
    /// Discovery only runs on a timer when set.
    pub discovery_interval: Option<Duration>,
    pub maintenance_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval: Duration::from_secs(30),
            reap_interval: Duration::from_secs(5 * 60),
            discovery_interval: None,
            maintenance_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl SchedulerConfig {
    fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            enabled: env.parse("SCHEDULER_ENABLED", defaults.enabled)?,
            tick_interval: env.secs("QUEUE_TICK_INTERVAL_SECS", defaults.tick_interval)?,
            reap_interval: env.secs("REAP_INTERVAL_SECS", defaults.reap_interval)?,
            discovery_interval: env.optional_secs("DISCOVERY_INTERVAL_SECS")?,
            maintenance_interval: env
                .secs("MAINTENANCE_INTERVAL_SECS", defaults.maintenance_interval)?,
        };

        // tokio intervals panic on a zero period.
        for (name, interval) in [
            ("QUEUE_TICK_INTERVAL_SECS", config.tick_interval),
            ("REAP_INTERVAL_SECS", config.reap_interval),
            ("MAINTENANCE_INTERVAL_SECS", config.maintenance_interval),
        ] {
            if interval.is_zero() {
                return Err(Error::config(format!("{name} must be greater than 0")));
            }
        }
        Ok(config)
    }
}

/// Whole-process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiServerConfig,
    pub pipeline: PipelineConfig,
    pub providers: ProviderConfig,
    pub scheduler: SchedulerConfig,
    pub log_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::new(&|key| std::env::var(key).ok()))
    }

    pub fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_source(env)?,
            api: ApiServerConfig::from_source(env)?,
            pipeline: PipelineConfig::from_source(env)?,
            providers: ProviderConfig::from_source(env)?,
            scheduler: SchedulerConfig::from_source(env)?,
            log_dir: env.string("LOG_DIR", "logs"),
        })
    }
}
