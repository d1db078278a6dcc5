//! Queue-management routes.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;

use super::pipeline::target_language;
use super::{parse_body, required};
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::database::models::{JobCounts, JobPayload, JobType, NewJob};
use crate::domain::AnalysisKind;
use crate::pipeline::{ReapReport, TickOutcome};

/// Create the queue router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tick", post(tick))
        .route("/reap", post(reap))
        .route("/enqueue", post(enqueue))
        .route("/stats", get(stats))
}

/// Run one coordinator cycle.
async fn tick(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    match state.services.coordinator.process_next().await? {
        TickOutcome::Empty => Ok(Json(json!({ "message": "No pending jobs" }))),
        TickOutcome::Processed(outcome) => Ok(Json(serde_json::to_value(outcome).map_err(
            |e| ApiError::internal("INTERNAL_ERROR", e.to_string()),
        )?)),
    }
}

async fn reap(State(state): State<AppState>) -> ApiResult<Json<ReapReport>> {
    Ok(Json(state.services.reaper.sweep().await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub candidate_id: Option<String>,
    pub job_type: Option<String>,
    pub priority: Option<i64>,
    pub max_attempts: Option<i64>,
    pub target_lang: Option<String>,
    #[serde(default)]
    pub is_trending: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    /// False when an identical job was already pending or processing.
    pub queued: bool,
    pub job_id: Option<i64>,
    pub candidate_id: String,
    pub job_type: JobType,
}

async fn enqueue(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<EnqueueResponse>> {
    let request: EnqueueRequest = parse_body(&body)?;
    let candidate_id = required(request.candidate_id, "candidateId")?;
    let raw_type = required(request.job_type, "jobType")?;
    let job_type = JobType::from_str(&raw_type).map_err(|_| {
        ApiError::validation(format!(
            "Unknown jobType '{raw_type}'; expected fetch, analyze or translate"
        ))
    })?;

    let max_attempts = request
        .max_attempts
        .unwrap_or(state.services.pipeline_config.default_max_attempts);
    if max_attempts < 1 {
        return Err(ApiError::validation("maxAttempts must be at least 1"));
    }

    // Surface a missing candidate as 404 rather than a foreign key failure.
    state.services.candidates.get_candidate(&candidate_id).await?;

    let mut job = NewJob::new(&candidate_id, job_type, max_attempts)
        .with_priority(request.priority.unwrap_or(0));
    if job_type == JobType::Translate {
        let target = target_language(request.target_lang.as_deref())?;
        job = job.with_payload(JobPayload::translate(
            target,
            AnalysisKind::from_trending_flag(request.is_trending),
        ));
    }

    let job_id = state.services.jobs.enqueue(&job).await?;
    Ok(Json(EnqueueResponse {
        queued: job_id.is_some(),
        job_id,
        candidate_id,
        job_type,
    }))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<JobCounts>> {
    Ok(Json(state.services.jobs.count_by_status().await?))
}
