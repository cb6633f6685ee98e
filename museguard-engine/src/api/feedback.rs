//! Feedback submission and engine statistics endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use museguard_common::db::models::{FeedbackKind, FeedbackRecord};
use serde::Deserialize;

use crate::services::stats::EngineStats;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub verdict_id: i64,
    pub feedback_type: FeedbackKind,
    pub details: Option<String>,
    pub reporter: Option<String>,
}

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<FeedbackRecord>)> {
    let record = state
        .feedback
        .submit(
            request.verdict_id,
            request.feedback_type,
            request.details,
            request.reporter,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/verdicts/:id/feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<FeedbackRecord>>> {
    Ok(Json(state.feedback.list_for_verdict(id).await?))
}

/// GET /api/stats
pub async fn engine_stats(State(state): State<AppState>) -> ApiResult<Json<EngineStats>> {
    Ok(Json(state.stats.collect().await?))
}

/// Build feedback routes
pub fn feedback_routes() -> Router<AppState> {
    Router::new()
        .route("/api/feedback", post(submit_feedback))
        .route("/api/verdicts/:id/feedback", get(list_feedback))
        .route("/api/stats", get(engine_stats))
}
