//! Aggregate statistics over stored verdicts

use museguard_common::db::models::{Issue, RuleFamily};
use museguard_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Trailing window for the "recent" aggregates
const STATS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_verdicts: i64,
    /// Verdicts in the trailing 30-day window
    pub recent_verdicts: i64,
    /// Mean compliance score over the window; null with no recent verdicts
    pub average_compliance_score: Option<f64>,
    pub copyright_issues: i64,
    pub bias_issues: i64,
    pub total_feedback: i64,
}

#[derive(Clone)]
pub struct StatsService {
    db: SqlitePool,
}

impl StatsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn collect(&self) -> Result<EngineStats> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(STATS_WINDOW_DAYS)).to_rfc3339();

        let total_verdicts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verdicts")
            .fetch_one(&self.db)
            .await?;

        let (recent_verdicts, average_compliance_score): (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), AVG(compliance_score) FROM verdicts WHERE created_at >= ?",
        )
        .bind(&cutoff)
        .fetch_one(&self.db)
        .await?;

        // Decode the stored issue lists and tally verdicts per family;
        // matching on serialized text would also hit detail strings
        let issue_rows: Vec<String> =
            sqlx::query_scalar("SELECT issues FROM verdicts WHERE created_at >= ?")
                .bind(&cutoff)
                .fetch_all(&self.db)
                .await?;
        let mut copyright_issues = 0i64;
        let mut bias_issues = 0i64;
        for json in issue_rows {
            let issues: Vec<Issue> = match serde_json::from_str(&json) {
                Ok(issues) => issues,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping corrupt issues JSON in stats");
                    continue;
                }
            };
            if issues.iter().any(|i| i.family == RuleFamily::Copyright) {
                copyright_issues += 1;
            }
            if issues.iter().any(|i| i.family == RuleFamily::Bias) {
                bias_issues += 1;
            }
        }

        let total_feedback: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.db)
            .await?;

        Ok(EngineStats {
            total_verdicts,
            recent_verdicts,
            average_compliance_score,
            copyright_issues,
            bias_issues,
            total_feedback,
        })
    }
}
