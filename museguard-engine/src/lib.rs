//! MuseGuard compliance engine
//!
//! Analyzes submitted audio for copyright similarity, lyrical bias, and
//! explicit content, persists verdicts keyed by content hash, and adapts
//! its rule thresholds from operator feedback.

pub mod api;
pub mod error;
pub mod extractors;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::extractors::{KeywordBiasClassifier, SpectralFingerprinter, UnavailableTranscriber};
use crate::services::analyzer::Analyzer;
use crate::services::feedback::{FeedbackService, ThresholdAdapter};
use crate::services::rules::RuleRegistry;
use crate::services::stats::StatsService;
use crate::services::tasks::TaskOrchestrator;
use crate::services::verdicts::VerdictStore;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use museguard_common::config::EngineConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<EngineConfig>,
    pub analyzer: Analyzer,
    pub orchestrator: TaskOrchestrator,
    pub registry: RuleRegistry,
    pub verdicts: VerdictStore,
    pub feedback: FeedbackService,
    pub adapter: ThresholdAdapter,
    pub stats: StatsService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the engine together with the built-in extractors
    pub fn new(db: SqlitePool, config: EngineConfig) -> Self {
        let analyzer = Analyzer::new(
            db.clone(),
            Arc::new(SpectralFingerprinter),
            Arc::new(KeywordBiasClassifier),
            Arc::new(UnavailableTranscriber),
        );
        let registry = RuleRegistry::new(db.clone());
        Self {
            orchestrator: TaskOrchestrator::new(db.clone(), analyzer.clone()),
            adapter: ThresholdAdapter::new(db.clone(), registry.clone()),
            verdicts: VerdictStore::new(db.clone()),
            feedback: FeedbackService::new(db.clone()),
            stats: StatsService::new(db.clone()),
            registry,
            analyzer,
            config: Arc::new(config),
            db,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Submissions arrive as raw bodies; allow a little headroom over the
    // configured limit so the pipeline's own size check produces the error
    let body_limit = state.config.max_file_size_bytes() as usize + 1024 * 1024;

    Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .merge(api::rule_routes())
        .merge(api::settings_routes())
        .merge(api::verdict_routes())
        .merge(api::feedback_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
