//! Compliance rule management endpoints

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use museguard_common::db::models::{Rule, RuleFamily};
use serde::Deserialize;
use serde_json::json;

use crate::services::feedback::AdaptationOutcome;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct UpsertRuleRequest {
    pub rule_type: RuleFamily,
    pub rule_name: String,
    pub threshold: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// GET /api/rules
pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<Rule>>> {
    Ok(Json(state.registry.list().await?))
}

/// PUT /api/rules
pub async fn upsert_rule(
    State(state): State<AppState>,
    Json(request): Json<UpsertRuleRequest>,
) -> ApiResult<Json<Rule>> {
    let rule = state
        .registry
        .upsert(
            request.rule_type,
            &request.rule_name,
            request.threshold,
            request.enabled,
        )
        .await?;
    Ok(Json(rule))
}

/// DELETE /api/rules/:rule_type/:rule_name
pub async fn delete_rule(
    State(state): State<AppState>,
    Path((rule_type, rule_name)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let family: RuleFamily = rule_type
        .parse()
        .map_err(|e: museguard_common::Error| ApiError::BadRequest(e.to_string()))?;
    state.registry.delete(family, &rule_name).await?;
    Ok(Json(json!({ "deleted": format!("{}/{}", family, rule_name) })))
}

/// POST /api/rules/adapt
///
/// Run one threshold-adaptation pass on demand instead of waiting for the
/// periodic loop.
pub async fn adapt_rules(State(state): State<AppState>) -> ApiResult<Json<AdaptationOutcome>> {
    Ok(Json(state.adapter.run_once().await?))
}

/// Build rule management routes
pub fn rule_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rules", get(list_rules).put(upsert_rule))
        .route("/api/rules/:rule_type/:rule_name", delete(delete_rule))
        .route("/api/rules/adapt", post(adapt_rules))
}
