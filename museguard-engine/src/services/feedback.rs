//! Operator feedback and adaptive threshold control
//!
//! Feedback records are append-only. The adapter is a stabilizing control
//! loop, not a learner: when recent accuracy drops below the floor it
//! tightens the copyright and bias thresholds by a fixed step, clamped so
//! repeated adjustments can never leave the valid range.

use crate::services::rules::{RuleRegistry, SIMILARITY_THRESHOLD, TOXICITY_THRESHOLD};
use museguard_common::db::models::{parse_timestamp, FeedbackKind, FeedbackRecord, RuleFamily};
use museguard_common::{Error, Result};
use sqlx::SqlitePool;

/// Trailing window the adapter inspects
pub const FEEDBACK_WINDOW_DAYS: i64 = 7;
/// Minimum records in the window before the adapter acts
pub const MIN_FEEDBACK_SAMPLES: i64 = 10;
/// Accuracy below this triggers tightening
pub const ACCURACY_FLOOR: f64 = 0.8;
/// Fixed tightening step
pub const THRESHOLD_STEP: f64 = 0.05;
/// Threshold clamp bounds
pub const THRESHOLD_MIN: f64 = 0.1;
pub const THRESHOLD_MAX: f64 = 1.0;

#[derive(Clone)]
pub struct FeedbackService {
    db: SqlitePool,
}

impl FeedbackService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a feedback record for an existing verdict
    pub async fn submit(
        &self,
        verdict_id: i64,
        feedback_type: FeedbackKind,
        details: Option<String>,
        reporter: Option<String>,
    ) -> Result<FeedbackRecord> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM verdicts WHERE id = ?")
            .bind(verdict_id)
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Verdict {}", verdict_id)));
        }

        let now = chrono::Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO feedback (verdict_id, feedback_type, details, reporter, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(verdict_id)
        .bind(feedback_type.as_str())
        .bind(&details)
        .bind(&reporter)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await?;

        tracing::info!(
            verdict_id,
            feedback_type = feedback_type.as_str(),
            "Feedback recorded"
        );

        Ok(FeedbackRecord {
            id: result.last_insert_rowid(),
            verdict_id,
            feedback_type,
            details,
            reporter,
            created_at: now,
        })
    }

    /// Feedback records for one verdict, oldest first
    pub async fn list_for_verdict(&self, verdict_id: i64) -> Result<Vec<FeedbackRecord>> {
        let rows: Vec<(i64, i64, String, Option<String>, Option<String>, String)> = sqlx::query_as(
            "SELECT id, verdict_id, feedback_type, details, reporter, created_at \
             FROM feedback WHERE verdict_id = ? ORDER BY id",
        )
        .bind(verdict_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(id, verdict_id, feedback_type, details, reporter, created_at)| {
                Ok(FeedbackRecord {
                    id,
                    verdict_id,
                    feedback_type: feedback_type.parse()?,
                    details,
                    reporter,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

/// Result of one adaptation pass
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdaptationOutcome {
    /// Fewer than the minimum samples in the window; nothing changed
    InsufficientSamples { samples: i64 },
    /// No correct/incorrect records to compute accuracy from
    NoSignal { samples: i64 },
    /// Accuracy at or above the floor; thresholds untouched
    Steady { accuracy: f64 },
    /// Thresholds tightened by the fixed step
    Tightened {
        accuracy: f64,
        similarity_threshold: Option<f64>,
        toxicity_threshold: Option<f64>,
    },
}

/// Periodic feedback-driven threshold adapter
#[derive(Clone)]
pub struct ThresholdAdapter {
    db: SqlitePool,
    registry: RuleRegistry,
}

impl ThresholdAdapter {
    pub fn new(db: SqlitePool, registry: RuleRegistry) -> Self {
        Self { db, registry }
    }

    /// Run one adaptation pass over the trailing feedback window
    pub async fn run_once(&self) -> Result<AdaptationOutcome> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(FEEDBACK_WINDOW_DAYS)).to_rfc3339();

        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT feedback_type, COUNT(*) FROM feedback WHERE created_at >= ? GROUP BY feedback_type",
        )
        .bind(&cutoff)
        .fetch_all(&self.db)
        .await?;

        let mut correct = 0i64;
        let mut incorrect = 0i64;
        let mut partial = 0i64;
        for (feedback_type, count) in counts {
            match feedback_type.as_str() {
                "correct" => correct = count,
                "incorrect" => incorrect = count,
                "partial" => partial = count,
                other => tracing::warn!(feedback_type = other, "Ignoring unknown feedback type"),
            }
        }

        let samples = correct + incorrect + partial;
        if samples < MIN_FEEDBACK_SAMPLES {
            tracing::debug!(samples, "Not enough feedback for threshold adaptation");
            return Ok(AdaptationOutcome::InsufficientSamples { samples });
        }

        // "partial" is excluded from the accuracy denominator
        let graded = correct + incorrect;
        if graded == 0 {
            return Ok(AdaptationOutcome::NoSignal { samples });
        }
        let accuracy = correct as f64 / graded as f64;

        if accuracy >= ACCURACY_FLOOR {
            tracing::debug!(accuracy, "Verdict accuracy acceptable, thresholds unchanged");
            return Ok(AdaptationOutcome::Steady { accuracy });
        }

        let similarity_threshold = self
            .registry
            .adjust_threshold(
                RuleFamily::Copyright,
                SIMILARITY_THRESHOLD,
                THRESHOLD_STEP,
                THRESHOLD_MIN,
                THRESHOLD_MAX,
            )
            .await?;
        let toxicity_threshold = self
            .registry
            .adjust_threshold(
                RuleFamily::Bias,
                TOXICITY_THRESHOLD,
                THRESHOLD_STEP,
                THRESHOLD_MIN,
                THRESHOLD_MAX,
            )
            .await?;

        tracing::info!(
            accuracy,
            ?similarity_threshold,
            ?toxicity_threshold,
            "Thresholds tightened from feedback"
        );

        Ok(AdaptationOutcome::Tightened {
            accuracy,
            similarity_threshold,
            toxicity_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        pool: SqlitePool,
        feedback: FeedbackService,
        adapter: ThresholdAdapter,
        registry: RuleRegistry,
        verdict_id: i64,
    }

    async fn fixture() -> Fixture {
        let pool = museguard_common::db::init_memory_pool().await.unwrap();
        let registry = RuleRegistry::new(pool.clone());
        let verdict_id = sqlx::query(
            r#"
            INSERT INTO verdicts (filename, content_hash, compliance_score, issues,
                                  recommendations, metadata, created_at)
            VALUES ('song.mp3', 'hash', 0.9, '[]', '[]', '{}', ?)
            "#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        Fixture {
            feedback: FeedbackService::new(pool.clone()),
            adapter: ThresholdAdapter::new(pool.clone(), registry.clone()),
            registry,
            pool,
            verdict_id,
        }
    }

    async fn submit_many(fx: &Fixture, kind: FeedbackKind, n: usize) {
        for _ in 0..n {
            fx.feedback.submit(fx.verdict_id, kind, None, None).await.unwrap();
        }
    }

    async fn copyright_threshold(fx: &Fixture) -> f64 {
        fx.registry
            .get(RuleFamily::Copyright, SIMILARITY_THRESHOLD)
            .await
            .unwrap()
            .unwrap()
            .threshold
    }

    #[tokio::test]
    async fn test_submit_requires_existing_verdict() {
        let fx = fixture().await;
        let result = fx.feedback.submit(9999, FeedbackKind::Correct, None, None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_and_list() {
        let fx = fixture().await;
        fx.feedback
            .submit(fx.verdict_id, FeedbackKind::Partial, Some("half right".into()), Some("op".into()))
            .await
            .unwrap();

        let records = fx.feedback.list_for_verdict(fx.verdict_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback_type, FeedbackKind::Partial);
        assert_eq!(records[0].details.as_deref(), Some("half right"));
    }

    #[tokio::test]
    async fn test_gating_below_minimum_samples() {
        let fx = fixture().await;
        submit_many(&fx, FeedbackKind::Incorrect, 9).await;

        let before = copyright_threshold(&fx).await;
        let outcome = fx.adapter.run_once().await.unwrap();
        assert_eq!(outcome, AdaptationOutcome::InsufficientSamples { samples: 9 });
        assert_eq!(copyright_threshold(&fx).await, before);
    }

    #[tokio::test]
    async fn test_good_accuracy_leaves_thresholds_alone() {
        let fx = fixture().await;
        submit_many(&fx, FeedbackKind::Correct, 9).await;
        submit_many(&fx, FeedbackKind::Incorrect, 1).await;

        let before = copyright_threshold(&fx).await;
        let outcome = fx.adapter.run_once().await.unwrap();
        assert!(matches!(outcome, AdaptationOutcome::Steady { accuracy } if accuracy >= 0.8));
        assert_eq!(copyright_threshold(&fx).await, before);
    }

    #[tokio::test]
    async fn test_poor_accuracy_tightens_both_thresholds() {
        let fx = fixture().await;
        submit_many(&fx, FeedbackKind::Correct, 5).await;
        submit_many(&fx, FeedbackKind::Incorrect, 5).await;

        let outcome = fx.adapter.run_once().await.unwrap();
        match outcome {
            AdaptationOutcome::Tightened { accuracy, similarity_threshold, toxicity_threshold } => {
                assert!((accuracy - 0.5).abs() < 1e-9);
                assert!((similarity_threshold.unwrap() - 0.75).abs() < 1e-9);
                assert!((toxicity_threshold.unwrap() - 0.45).abs() < 1e-9);
            }
            other => panic!("Expected Tightened, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_excluded_from_accuracy() {
        let fx = fixture().await;
        // 8 correct + 2 incorrect = 80% accuracy; 10 partials only bump the
        // sample count past the gate
        submit_many(&fx, FeedbackKind::Correct, 8).await;
        submit_many(&fx, FeedbackKind::Incorrect, 2).await;
        submit_many(&fx, FeedbackKind::Partial, 10).await;

        let outcome = fx.adapter.run_once().await.unwrap();
        assert!(matches!(outcome, AdaptationOutcome::Steady { accuracy } if (accuracy - 0.8).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_repeated_tightening_respects_clamp() {
        let fx = fixture().await;
        submit_many(&fx, FeedbackKind::Incorrect, 10).await;

        for _ in 0..20 {
            fx.adapter.run_once().await.unwrap();
        }
        let threshold = copyright_threshold(&fx).await;
        assert!((threshold - THRESHOLD_MAX).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_old_feedback_outside_window_ignored() {
        let fx = fixture().await;
        let stale = (chrono::Utc::now() - chrono::Duration::days(30)).to_rfc3339();
        for _ in 0..15 {
            sqlx::query(
                "INSERT INTO feedback (verdict_id, feedback_type, created_at) VALUES (?, 'incorrect', ?)",
            )
            .bind(fx.verdict_id)
            .bind(&stale)
            .execute(&fx.pool)
            .await
            .unwrap();
        }

        let outcome = fx.adapter.run_once().await.unwrap();
        assert_eq!(outcome, AdaptationOutcome::InsufficientSamples { samples: 0 });
    }
}
