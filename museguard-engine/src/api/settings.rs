//! Operational settings endpoints
//!
//! The limits the pipeline and orchestrator read live in the settings
//! table, so updates here take effect without a restart.

use axum::{extract::State, routing::get, Json, Router};
use museguard_common::db::settings;
use serde::{Deserialize, Serialize};

use crate::services::analyzer::DEFAULT_MAX_FILE_SIZE_MB;
use crate::services::tasks::{DEFAULT_ANALYSIS_TIMEOUT_SECONDS, DEFAULT_TASK_RETENTION_HOURS};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub max_file_size_mb: i64,
    pub analysis_timeout_seconds: i64,
    pub task_retention_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub max_file_size_mb: Option<i64>,
    pub analysis_timeout_seconds: Option<i64>,
    pub task_retention_hours: Option<i64>,
}

async fn current_settings(state: &AppState) -> ApiResult<SettingsResponse> {
    Ok(SettingsResponse {
        max_file_size_mb: settings::get_i64(
            &state.db,
            settings::MAX_FILE_SIZE_MB,
            DEFAULT_MAX_FILE_SIZE_MB,
        )
        .await?,
        analysis_timeout_seconds: settings::get_i64(
            &state.db,
            settings::ANALYSIS_TIMEOUT_SECONDS,
            DEFAULT_ANALYSIS_TIMEOUT_SECONDS,
        )
        .await?,
        task_retention_hours: settings::get_i64(
            &state.db,
            settings::TASK_RETENTION_HOURS,
            DEFAULT_TASK_RETENTION_HOURS,
        )
        .await?,
    })
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    Ok(Json(current_settings(&state).await?))
}

/// PUT /api/settings
///
/// Partial update: only the supplied keys change. Every limit must be a
/// positive integer.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    let updates = [
        (settings::MAX_FILE_SIZE_MB, request.max_file_size_mb),
        (settings::ANALYSIS_TIMEOUT_SECONDS, request.analysis_timeout_seconds),
        (settings::TASK_RETENTION_HOURS, request.task_retention_hours),
    ];

    for (key, value) in updates {
        if let Some(value) = value {
            if value < 1 {
                return Err(ApiError::BadRequest(format!(
                    "{} must be a positive integer, got {}",
                    key, value
                )));
            }
            settings::set(&state.db, key, &value.to_string()).await?;
            tracing::info!(key, value, "Setting updated");
        }
    }

    Ok(Json(current_settings(&state).await?))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(update_settings))
}
