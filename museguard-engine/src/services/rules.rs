//! Compliance rule registry
//!
//! CRUD over rules keyed by (rule_type, rule_name), plus the single-query
//! snapshot the scorer reads. Upserts are idempotent on the key; deleting a
//! rule that does not exist is an error.

use crate::services::scorer::{RuleSnapshot, RuleState};
use museguard_common::db::models::{parse_timestamp, Rule, RuleFamily};
use museguard_common::{Error, Result};
use sqlx::SqlitePool;

/// Canonical rule names read by the scorer and the threshold adapter
pub const SIMILARITY_THRESHOLD: &str = "similarity_threshold";
pub const TOXICITY_THRESHOLD: &str = "toxicity_threshold";
pub const EXPLICIT_CONTENT_THRESHOLD: &str = "explicit_content_threshold";

type RuleRow = (i64, String, String, f64, bool, String, String);

const RULE_COLUMNS: &str = "id, rule_type, rule_name, threshold, enabled, created_at, updated_at";

#[derive(Clone)]
pub struct RuleRegistry {
    db: SqlitePool,
}

impl RuleRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All rules, in creation order
    pub async fn list(&self) -> Result<Vec<Rule>> {
        let rows: Vec<RuleRow> =
            sqlx::query_as(&format!("SELECT {} FROM rules ORDER BY id", RULE_COLUMNS))
                .fetch_all(&self.db)
                .await?;
        rows.into_iter().map(decode_rule).collect()
    }

    /// Look up one rule by its stable key
    pub async fn get(&self, family: RuleFamily, name: &str) -> Result<Option<Rule>> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM rules WHERE rule_type = ? AND rule_name = ?",
            RULE_COLUMNS
        ))
        .bind(family.as_str())
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        row.map(decode_rule).transpose()
    }

    /// Create or update a rule. Idempotent on (rule_type, rule_name).
    pub async fn upsert(
        &self,
        family: RuleFamily,
        name: &str,
        threshold: f64,
        enabled: bool,
    ) -> Result<Rule> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidInput(format!(
                "Rule threshold must be in [0, 1], got {}",
                threshold
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO rules (rule_type, rule_name, threshold, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(rule_type, rule_name) DO UPDATE SET
                threshold = excluded.threshold,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(family.as_str())
        .bind(name)
        .bind(threshold)
        .bind(enabled)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        tracing::info!(
            rule_type = family.as_str(),
            rule_name = name,
            threshold,
            enabled,
            "Rule upserted"
        );

        self.get(family, name).await?.ok_or_else(|| {
            Error::Internal(format!("Rule {}/{} vanished after upsert", family, name))
        })
    }

    /// Delete a rule. Deleting a non-existent rule is an error.
    pub async fn delete(&self, family: RuleFamily, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM rules WHERE rule_type = ? AND rule_name = ?")
            .bind(family.as_str())
            .bind(name)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Rule {}/{}", family, name)));
        }

        tracing::info!(rule_type = family.as_str(), rule_name = name, "Rule deleted");
        Ok(())
    }

    /// Nudge a rule threshold by `delta`, clamped to [`lo`, `hi`].
    ///
    /// The clamp happens inside a single UPDATE so concurrent adjustments
    /// cannot push the stored value outside the bounds. Returns the new
    /// threshold, or `None` if the rule does not exist.
    pub async fn adjust_threshold(
        &self,
        family: RuleFamily,
        name: &str,
        delta: f64,
        lo: f64,
        hi: f64,
    ) -> Result<Option<f64>> {
        let result = sqlx::query(
            r#"
            UPDATE rules
            SET threshold = MAX(?, MIN(?, threshold + ?)), updated_at = ?
            WHERE rule_type = ? AND rule_name = ?
            "#,
        )
        .bind(lo)
        .bind(hi)
        .bind(delta)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(family.as_str())
        .bind(name)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let threshold: f64 =
            sqlx::query_scalar("SELECT threshold FROM rules WHERE rule_type = ? AND rule_name = ?")
                .bind(family.as_str())
                .bind(name)
                .fetch_one(&self.db)
                .await?;

        tracing::info!(
            rule_type = family.as_str(),
            rule_name = name,
            new_threshold = threshold,
            "Rule threshold adjusted"
        );
        Ok(Some(threshold))
    }

    /// Load the (threshold, enabled) pairs of the three scoring rules in
    /// one query. The scorer works from this snapshot only; it never reads
    /// the registry mid-pass.
    pub async fn snapshot(&self) -> Result<RuleSnapshot> {
        let rows: Vec<(String, String, f64, bool)> =
            sqlx::query_as("SELECT rule_type, rule_name, threshold, enabled FROM rules")
                .fetch_all(&self.db)
                .await?;

        let mut snapshot = RuleSnapshot::default();
        for (rule_type, rule_name, threshold, enabled) in rows {
            let state = RuleState { threshold, enabled };
            match (rule_type.as_str(), rule_name.as_str()) {
                ("copyright", SIMILARITY_THRESHOLD) => snapshot.copyright = Some(state),
                ("bias", TOXICITY_THRESHOLD) => snapshot.bias = Some(state),
                ("content", EXPLICIT_CONTENT_THRESHOLD) => snapshot.content = Some(state),
                _ => {}
            }
        }
        Ok(snapshot)
    }
}

fn decode_rule(row: RuleRow) -> Result<Rule> {
    let (id, rule_type, rule_name, threshold, enabled, created_at, updated_at) = row;
    Ok(Rule {
        id,
        rule_type: rule_type.parse()?,
        rule_name,
        threshold,
        enabled,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> RuleRegistry {
        let pool = museguard_common::db::init_memory_pool().await.unwrap();
        RuleRegistry::new(pool)
    }

    #[tokio::test]
    async fn test_defaults_seeded() {
        let registry = registry().await;
        let rules = registry.list().await.unwrap();
        assert_eq!(rules.len(), 3);

        let copyright = registry
            .get(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .unwrap()
            .unwrap();
        assert!((copyright.threshold - 0.7).abs() < 1e-9);
        assert!(copyright.enabled);
    }

    #[tokio::test]
    async fn test_upsert_idempotent_on_key() {
        let registry = registry().await;

        let first = registry
            .upsert(RuleFamily::Bias, TOXICITY_THRESHOLD, 0.5, true)
            .await
            .unwrap();
        let second = registry
            .upsert(RuleFamily::Bias, TOXICITY_THRESHOLD, 0.6, false)
            .await
            .unwrap();

        // Same identity, updated attributes
        assert_eq!(first.id, second.id);
        assert!((second.threshold - 0.6).abs() < 1e-9);
        assert!(!second.enabled);
        assert_eq!(registry.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_upsert_rejects_out_of_range_threshold() {
        let registry = registry().await;
        assert!(registry
            .upsert(RuleFamily::Bias, TOXICITY_THRESHOLD, 1.5, true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let registry = registry().await;
        let result = registry.delete(RuleFamily::Copyright, "no_such_rule").await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        registry
            .delete(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .unwrap();
        // Second delete of the same key errors
        assert!(registry
            .delete(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_adjust_threshold_clamps() {
        let registry = registry().await;

        // Repeated tightening never exceeds the upper bound
        for _ in 0..10 {
            registry
                .adjust_threshold(RuleFamily::Copyright, SIMILARITY_THRESHOLD, 0.05, 0.1, 1.0)
                .await
                .unwrap();
        }
        let rule = registry
            .get(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .unwrap()
            .unwrap();
        assert!((rule.threshold - 1.0).abs() < 1e-9);

        // And never drops below the lower bound
        for _ in 0..30 {
            registry
                .adjust_threshold(RuleFamily::Copyright, SIMILARITY_THRESHOLD, -0.05, 0.1, 1.0)
                .await
                .unwrap();
        }
        let rule = registry
            .get(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .unwrap()
            .unwrap();
        assert!((rule.threshold - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_adjust_missing_rule_returns_none() {
        let registry = registry().await;
        let result = registry
            .adjust_threshold(RuleFamily::Content, "missing", 0.05, 0.1, 1.0)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_snapshot_covers_three_families() {
        let registry = registry().await;
        let snapshot = registry.snapshot().await.unwrap();
        assert!(snapshot.copyright.is_some());
        assert!(snapshot.bias.is_some());
        assert!(snapshot.content.is_some());
        assert!((snapshot.bias.unwrap().threshold - 0.4).abs() < 1e-9);
    }
}
