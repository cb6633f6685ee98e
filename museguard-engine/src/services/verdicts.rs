//! Verdict retrieval and transcript correction
//!
//! Stored verdicts are immutable once written, with one exception: the
//! transcript in metadata may be replaced by an operator, which marks the
//! transcript source as edited. Scores and issues are never recomputed on
//! edit.

use crate::services::similarity::{SimilaritySearcher, DEFAULT_SIMILARITY_THRESHOLD};
use museguard_common::db::models::{
    SimilarMatch, TranscriptSource, Verdict, VerdictRow, VERDICT_COLUMNS,
};
use museguard_common::{Error, Result};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct VerdictStore {
    db: SqlitePool,
}

impl VerdictStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn fetch_by_id(&self, id: i64) -> Result<Verdict> {
        let row: Option<VerdictRow> =
            sqlx::query_as(&format!("SELECT {} FROM verdicts WHERE id = ?", VERDICT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        match row {
            Some(row) => Verdict::decode(row),
            None => Err(Error::NotFound(format!("Verdict {}", id))),
        }
    }

    pub async fn fetch_by_hash(&self, content_hash: &str) -> Result<Option<Verdict>> {
        let row: Option<VerdictRow> = sqlx::query_as(&format!(
            "SELECT {} FROM verdicts WHERE content_hash = ?",
            VERDICT_COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(&self.db)
        .await?;
        row.map(Verdict::decode).transpose()
    }

    /// Most recent verdicts first, paginated
    pub async fn recent(&self, limit: i64, offset: i64) -> Result<Vec<Verdict>> {
        let rows: Vec<VerdictRow> = sqlx::query_as(&format!(
            "SELECT {} FROM verdicts ORDER BY id DESC LIMIT ? OFFSET ?",
            VERDICT_COLUMNS
        ))
        .bind(limit.clamp(1, 100))
        .bind(offset.max(0))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Verdict::decode).collect()
    }

    /// Replace the stored transcript for a verdict.
    ///
    /// Only the transcript and its source marker change; the compliance
    /// score and issues computed at analysis time stay as written.
    pub async fn update_transcript(&self, id: i64, transcript: String) -> Result<Verdict> {
        let verdict = self.fetch_by_id(id).await?;

        let mut metadata = verdict.metadata.clone();
        metadata.transcript = Some(transcript);
        metadata.transcript_source = TranscriptSource::Edited;

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;

        sqlx::query("UPDATE verdicts SET metadata = ? WHERE id = ?")
            .bind(metadata_json)
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(verdict_id = id, "Transcript edited");
        self.fetch_by_id(id).await
    }

    /// Re-run the similarity search for a stored verdict against the
    /// current corpus, excluding the verdict's own fingerprint.
    pub async fn similar_for(&self, id: i64) -> Result<Vec<SimilarMatch>> {
        let verdict = self.fetch_by_id(id).await?;

        let vector_json: Option<String> =
            sqlx::query_scalar("SELECT vector FROM fingerprints WHERE verdict_id = ?")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        let vector_json = match vector_json {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };
        let vector: Vec<f32> = serde_json::from_str(&vector_json)
            .map_err(|e| Error::Internal(format!("Corrupt fingerprint for verdict {}: {}", id, e)))?;

        let searcher = SimilaritySearcher::new(self.db.clone());
        let matches = searcher
            .search(&vector, DEFAULT_SIMILARITY_THRESHOLD)
            .await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.verdict_id != verdict.id)
            .collect())
    }
}
