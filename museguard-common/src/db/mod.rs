//! Database access for MuseGuard
//!
//! SQLite via sqlx. Tables are created on startup with
//! `CREATE TABLE IF NOT EXISTS`; no external migration files.

pub mod init;
pub mod models;
pub mod settings;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the SQLite database at `db_path` and bootstraps the
/// schema plus default compliance rules.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init::create_tables(&pool).await?;
    init::seed_default_rules(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests
///
/// Capped at one connection: every pooled `:memory:` connection is its own
/// private database, so a larger pool would hand callers empty schemas.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    init::create_tables(&pool).await?;
    init::seed_default_rules(&pool).await?;
    Ok(pool)
}
