//! Stored verdict endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use museguard_common::db::models::{SimilarMatch, Verdict};
use serde::Deserialize;
use serde_json::json;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub transcript: String,
}

/// GET /api/verdicts
pub async fn list_verdicts(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Verdict>>> {
    Ok(Json(state.verdicts.recent(page.limit, page.offset).await?))
}

/// GET /api/verdicts/:id
pub async fn get_verdict(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Verdict>> {
    Ok(Json(state.verdicts.fetch_by_id(id).await?))
}

/// GET /api/verdicts/:id/similar
///
/// Re-run the similarity search for a stored verdict against the current
/// corpus.
pub async fn similar_verdicts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<SimilarMatch>>> {
    Ok(Json(state.verdicts.similar_for(id).await?))
}

/// GET /api/verdicts/:id/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let verdict = state.verdicts.fetch_by_id(id).await?;
    Ok(Json(json!({
        "verdict_id": verdict.id,
        "transcript": verdict.metadata.transcript,
        "transcript_source": verdict.metadata.transcript_source,
    })))
}

/// PUT /api/verdicts/:id/transcript
pub async fn update_transcript(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<TranscriptRequest>,
) -> ApiResult<Json<Verdict>> {
    if request.transcript.trim().is_empty() {
        return Err(ApiError::BadRequest("Transcript must not be empty".to_string()));
    }
    Ok(Json(state.verdicts.update_transcript(id, request.transcript).await?))
}

/// Build verdict routes
pub fn verdict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/verdicts", get(list_verdicts))
        .route("/api/verdicts/:id", get(get_verdict))
        .route("/api/verdicts/:id/similar", get(similar_verdicts))
        .route(
            "/api/verdicts/:id/transcript",
            get(get_transcript).put(update_transcript),
        )
}
