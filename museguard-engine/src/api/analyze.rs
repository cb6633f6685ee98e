//! Analysis submission endpoints
//!
//! Submissions arrive as a raw request body with the filename (and optional
//! lyrics) in query parameters. Synchronous analysis blocks until the
//! verdict exists; asynchronous analysis returns a task id to poll.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::analyzer::{AnalysisOutcome, Submission};
use crate::services::tasks::TaskRecord;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    pub filename: String,
    pub lyrics: Option<String>,
}

fn submission_from(params: AnalyzeParams, body: Bytes) -> Submission {
    Submission {
        filename: params.filename,
        bytes: body.to_vec(),
        lyrics: params.lyrics,
    }
}

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    body: Bytes,
) -> ApiResult<Json<AnalysisOutcome>> {
    let outcome = state.analyzer.analyze(submission_from(params, body)).await?;
    Ok(Json(outcome))
}

/// POST /api/analyze/async
pub async fn analyze_async(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let task_id = state
        .orchestrator
        .submit(submission_from(params, body))
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": task_id, "status": "running" })),
    ))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskRecord>> {
    match state.orchestrator.get(task_id).await {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound(format!("Task {}", task_id))),
    }
}

/// GET /api/tasks
pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskRecord>> {
    Json(state.orchestrator.list().await)
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/analyze/async", post(analyze_async))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
}
