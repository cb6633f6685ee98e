//! Fingerprint similarity search
//!
//! Full scan of the stored fingerprint corpus per query: cosine similarity
//! on L2-normalized vectors, threshold filter, descending sort with
//! insertion order breaking ties. Linear in corpus size, which is fine at
//! the intended scale; an ANN index would slot in behind the same contract
//! if the corpus outgrows it.

use museguard_common::db::models::{parse_timestamp, SimilarMatch};
use museguard_common::{Error, Result};
use sqlx::SqlitePool;

/// Magnitudes below this are treated as zero (degenerate fingerprint)
const NORM_EPSILON: f64 = 1e-8;

/// Default similarity threshold for plagiarism search
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Searches the stored fingerprint corpus
#[derive(Clone)]
pub struct SimilaritySearcher {
    db: SqlitePool,
}

impl SimilaritySearcher {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find all stored fingerprints with cosine similarity >= `threshold`
    /// against `query`, sorted by similarity descending; equal scores keep
    /// insertion order (earlier records first).
    ///
    /// Records with a degenerate vector (near-zero magnitude, wrong
    /// dimension, corrupt JSON) are skipped and logged, never fatal.
    pub async fn search(&self, query: &[f32], threshold: f64) -> Result<Vec<SimilarMatch>> {
        if !(0.0..1.0).contains(&threshold) || threshold == 0.0 {
            return Err(Error::InvalidInput(format!(
                "Similarity threshold must be in (0, 1), got {}",
                threshold
            )));
        }

        let rows: Vec<(i64, String, String, i64, String, f64, String)> = sqlx::query_as(
            r#"
            SELECT f.id, f.content_hash, f.vector, f.verdict_id,
                   v.filename, v.compliance_score, v.created_at
            FROM fingerprints f
            JOIN verdicts v ON v.id = f.verdict_id
            ORDER BY f.id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut matches = Vec::new();
        for (record_id, content_hash, vector_json, verdict_id, filename, compliance_score, created_at) in rows {
            let stored: Vec<f32> = match serde_json::from_str(&vector_json) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(record_id, error = %e, "Skipping fingerprint with corrupt vector");
                    continue;
                }
            };

            if stored.len() != query.len() {
                tracing::warn!(
                    record_id,
                    stored_dim = stored.len(),
                    query_dim = query.len(),
                    "Skipping fingerprint with mismatched dimension"
                );
                continue;
            }

            let similarity = match cosine_similarity(query, &stored) {
                Some(s) => s,
                None => {
                    tracing::warn!(record_id, "Skipping fingerprint with near-zero magnitude");
                    continue;
                }
            };

            if similarity >= threshold {
                matches.push(SimilarMatch {
                    verdict_id,
                    filename,
                    similarity,
                    compliance_score,
                    content_hash,
                    created_at: parse_timestamp(&created_at)?,
                });
            }
        }

        // Stable sort over rows already in insertion order: ties keep
        // earlier-created records first
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));

        tracing::debug!(
            matches = matches.len(),
            threshold,
            "Similarity search completed"
        );
        Ok(matches)
    }

    /// Search and derive the plagiarism subscore from the best match
    pub async fn search_with_score(
        &self,
        query: &[f32],
        threshold: f64,
    ) -> Result<(f64, Vec<SimilarMatch>)> {
        let matches = self.search(query, threshold).await?;
        let top = matches.first().map(|m| m.similarity);
        let score = plagiarism_score(top, threshold);

        if let Some(s) = top {
            tracing::info!(
                plagiarism_score = score,
                top_similarity = s,
                "Plagiarism score derived from corpus"
            );
        }

        Ok((score, matches))
    }
}

/// Rescale the best similarity into a plagiarism subscore.
///
/// 0.0 when nothing cleared the threshold; otherwise the margin above the
/// threshold rescaled so "barely over" maps near 0 and "near-identical"
/// maps near 1, with no discontinuity at the boundary.
pub fn plagiarism_score(top_similarity: Option<f64>, threshold: f64) -> f64 {
    match top_similarity {
        Some(s) if s >= threshold => ((s - threshold) / (1.0 - threshold)).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Cosine similarity of two equal-length vectors on their L2-normalized
/// forms. `None` when either magnitude is near zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += (x as f64).powi(2);
        norm_b += (y as f64).powi(2);
    }
    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a < NORM_EPSILON || norm_b < NORM_EPSILON {
        return None;
    }
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Persist a fingerprint for a verdict. No-op if the content hash already
/// has one (dedup key).
pub async fn store_fingerprint<'e, E>(
    executor: E,
    content_hash: &str,
    vector: &[f32],
    verdict_id: i64,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let vector_json = serde_json::to_string(vector)
        .map_err(|e| Error::Internal(format!("Failed to serialize fingerprint: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO fingerprints (content_hash, vector, verdict_id, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(content_hash) DO NOTHING
        "#,
    )
    .bind(content_hash)
    .bind(vector_json)
    .bind(verdict_id)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}
