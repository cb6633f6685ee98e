//! museguard - Media compliance analysis engine
//!
//! Fingerprints submitted audio, searches the stored corpus for
//! plagiarism, scores lyrics for bias and explicit content, and serves
//! verdicts over HTTP.

use anyhow::Result;
use museguard_common::config::EngineConfig;
use museguard_common::db::settings;
use museguard_engine::services::tasks::spawn_background_loops;
use museguard_engine::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting museguard compliance engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load()?;
    info!("Database: {}", config.database_path.display());

    let db = museguard_common::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    // Operational limits live in settings so operators can tune them at
    // runtime; seeding never clobbers an existing override
    settings::seed_default(&db, settings::MAX_FILE_SIZE_MB, &config.max_file_size_mb.to_string())
        .await?;
    settings::seed_default(
        &db,
        settings::ANALYSIS_TIMEOUT_SECONDS,
        &config.analysis_timeout_seconds.to_string(),
    )
    .await?;
    settings::seed_default(
        &db,
        settings::TASK_RETENTION_HOURS,
        &config.task_retention_hours.to_string(),
    )
    .await?;

    let state = AppState::new(db, config.clone());
    spawn_background_loops(state.orchestrator.clone(), state.adapter.clone(), &config);
    info!(
        adaptation_interval_seconds = config.adaptation_interval_seconds,
        cleanup_interval_seconds = config.cleanup_interval_seconds,
        "Background loops started"
    );

    let app = museguard_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
