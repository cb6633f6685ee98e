//! Typed accessors over the key/value settings table
//!
//! Operational limits live in the database so operators can change them
//! without a restart; callers supply the compiled default for missing keys.

use crate::Result;
use sqlx::SqlitePool;

pub const MAX_FILE_SIZE_MB: &str = "max_file_size_mb";
pub const ANALYSIS_TIMEOUT_SECONDS: &str = "analysis_timeout_seconds";
pub const TASK_RETENTION_HOURS: &str = "task_retention_hours";

/// Get a string setting
pub async fn get_string(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Get an integer setting, falling back to `default` when missing or malformed
pub async fn get_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    match get_string(pool, key).await? {
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                tracing::warn!(key, value, "Malformed integer setting, using default");
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Set (insert or replace) a setting value
pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed a default value without clobbering an operator override
pub async fn seed_default(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
