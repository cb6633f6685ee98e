//! Schema bootstrap and default data
//!
//! Creates all MuseGuard tables if missing and seeds the three default
//! compliance rules. Safe to run on every startup.

use crate::Result;
use sqlx::SqlitePool;

/// Create all tables if they don't exist
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    // Compliance rules, keyed by (rule_type, rule_name)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY,
            rule_type TEXT NOT NULL,
            rule_name TEXT NOT NULL,
            threshold REAL NOT NULL DEFAULT 0.7,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(rule_type, rule_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Analysis verdicts. UNIQUE(content_hash) is the dedup invariant:
    // concurrent identical submissions converge on one row.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verdicts (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            compliance_score REAL NOT NULL,
            issues TEXT NOT NULL DEFAULT '[]',
            recommendations TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}',
            similar_matches TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Fingerprint corpus. Row id doubles as insertion order, which is the
    // tie-break for equal similarity scores.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            id INTEGER PRIMARY KEY,
            content_hash TEXT NOT NULL UNIQUE,
            vector TEXT NOT NULL,
            verdict_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Operator feedback on verdicts, append-only
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            verdict_id INTEGER NOT NULL,
            feedback_type TEXT NOT NULL,
            details TEXT,
            reporter TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Key/value system settings
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (rules, verdicts, fingerprints, feedback, settings)");

    Ok(())
}

/// Seed the three default compliance rules if absent
pub async fn seed_default_rules(pool: &SqlitePool) -> Result<()> {
    let defaults = [
        ("copyright", "similarity_threshold", 0.7_f64),
        ("bias", "toxicity_threshold", 0.4_f64),
        ("content", "explicit_content_threshold", 0.6_f64),
    ];

    let now = chrono::Utc::now().to_rfc3339();
    for (rule_type, rule_name, threshold) in defaults {
        sqlx::query(
            r#"
            INSERT INTO rules (rule_type, rule_name, threshold, enabled, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(rule_type, rule_name) DO NOTHING
            "#,
        )
        .bind(rule_type)
        .bind(rule_name)
        .bind(threshold)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    Ok(())
}
