//! Routes that run one pipeline stage synchronously.

use axum::{Json, Router, extract::State, routing::post};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::{parse_body, required};
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::{AnalysisKind, PrimaryMedia, TargetLanguage};

/// Create the pipeline stage router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/fetch", post(fetch))
        .route("/analyze", post(analyze))
        .route("/translate", post(translate))
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    /// Newly queued candidates.
    pub queued: usize,
    pub fetched: usize,
    pub skipped_duplicates: usize,
    pub candidate_ids: Vec<String>,
}

/// Largest feed page a caller may ask for.
const MAX_INGEST_LIMIT: usize = 100;

async fn ingest(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<IngestResponse>> {
    let request: IngestRequest = parse_body(&body)?;
    let limit = request
        .limit
        .unwrap_or(state.services.pipeline_config.discovery_limit);
    if limit == 0 || limit > MAX_INGEST_LIMIT {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {MAX_INGEST_LIMIT}"
        )));
    }

    let report = state.services.discovery.discover(limit).await?;
    Ok(Json(IngestResponse {
        success: true,
        queued: report.inserted.len(),
        fetched: report.fetched,
        skipped_duplicates: report.skipped_duplicates,
        candidate_ids: report.inserted,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub candidate_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub success: bool,
    pub candidate_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_storage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    pub thumbnail_url: Option<String>,
    pub creator_avatar_url: Option<String>,
    pub analysis_job_id: Option<i64>,
}

async fn fetch(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<FetchResponse>> {
    let request: CandidateRequest = parse_body(&body)?;
    let candidate_id = required(request.candidate_id, "candidateId")?;

    let outcome = state.services.fetch.fetch(&candidate_id).await?;
    let (video_storage_url, image_urls) = match outcome.media.primary {
        PrimaryMedia::Video { url } => (Some(url), None),
        PrimaryMedia::PhotoSet { urls } => (None, Some(urls)),
    };
    Ok(Json(FetchResponse {
        success: true,
        candidate_id,
        video_storage_url,
        image_urls,
        thumbnail_url: outcome.media.thumbnail_url,
        creator_avatar_url: outcome.media.creator_avatar_url,
        analysis_job_id: outcome.analysis_job_id,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub candidate_id: String,
    pub analysis: Value,
    pub adaptation_score: Option<f64>,
    pub is_adaptable: Option<bool>,
    pub translation_jobs: Vec<i64>,
}

async fn analyze(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<AnalyzeResponse>> {
    let request: CandidateRequest = parse_body(&body)?;
    let candidate_id = required(request.candidate_id, "candidateId")?;

    let outcome = state.services.analysis.analyze(&candidate_id).await?;
    Ok(Json(AnalyzeResponse {
        success: true,
        candidate_id,
        analysis: outcome.analysis,
        adaptation_score: outcome.adaptation_score,
        is_adaptable: outcome.is_adaptable,
        translation_jobs: outcome.translation_jobs,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub candidate_id: Option<String>,
    pub target_lang: Option<String>,
    #[serde(default)]
    pub is_trending: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub success: bool,
    pub candidate_id: String,
    pub target_lang: TargetLanguage,
    pub fields_translated: usize,
    pub translated: Value,
}

/// Parse a language code, defaulting to English.
pub(crate) fn target_language(raw: Option<&str>) -> Result<TargetLanguage, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(TargetLanguage::En),
        Some(code) => TargetLanguage::from_str(code)
            .map_err(|_| ApiError::validation(format!("Unsupported targetLang '{code}'"))),
    }
}

async fn translate(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<TranslateResponse>> {
    let request: TranslateRequest = parse_body(&body)?;
    let candidate_id = required(request.candidate_id, "candidateId")?;
    let target = target_language(request.target_lang.as_deref())?;
    let kind = AnalysisKind::from_trending_flag(request.is_trending);

    let outcome = state
        .services
        .translation
        .translate(&candidate_id, target, kind)
        .await?;
    Ok(Json(TranslateResponse {
        success: true,
        candidate_id,
        target_lang: outcome.target_lang,
        fields_translated: outcome.fields_translated,
        translated: outcome.translated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_language_parsing() {
        assert_eq!(target_language(None).unwrap(), TargetLanguage::En);
        assert_eq!(target_language(Some("DE")).unwrap(), TargetLanguage::De);
        assert!(target_language(Some("fr")).is_err());
    }

    #[test]
    fn test_empty_body_is_default() {
        let request: IngestRequest = parse_body(&Bytes::new()).unwrap();
        assert!(request.limit.is_none());
        assert!(parse_body::<IngestRequest>(&Bytes::from_static(b"{")).is_err());
    }
}
