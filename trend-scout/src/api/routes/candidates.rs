//! Candidate inspection routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::database::models::JobDbModel;
use crate::domain::Candidate;

/// Create the candidates router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_candidate))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub jobs: Vec<JobDbModel>,
}

async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CandidateResponse>> {
    let candidate = state
        .services
        .candidates
        .get_candidate(&id)
        .await?
        .into_domain()?;
    let jobs = state.services.jobs.list_jobs_for_candidate(&id).await?;
    Ok(Json(CandidateResponse { candidate, jobs }))
}
