//! The analysis pipeline
//!
//! One submission flows: validate, hash, dedup check, fingerprint,
//! similarity search, transcript resolution, bias scoring, rule snapshot,
//! weighted scoring, transactional persist. Hashing and fingerprinting are
//! CPU-bound and run on the blocking pool.
//!
//! Dedup converges under concurrency: the verdict insert is keyed on the
//! content hash with a do-nothing conflict clause, so of N identical
//! submissions exactly one row wins and the losers re-read it.

use crate::extractors::{BiasClassifier, FingerprintExtractor, Transcriber};
use crate::services::rules::RuleRegistry;
use crate::services::scorer;
use crate::services::similarity::{
    store_fingerprint, SimilaritySearcher, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::services::verdicts::VerdictStore;
use museguard_common::db::models::{TranscriptSource, Verdict, VerdictMetadata};
use museguard_common::db::settings;
use museguard_common::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Accepted submission filename extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg"];

/// Compiled default for the max submission size, overridable via settings
pub const DEFAULT_MAX_FILE_SIZE_MB: i64 = 100;

/// One unit of work for the pipeline
#[derive(Debug, Clone)]
pub struct Submission {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Lyrics supplied by the caller; takes precedence over transcription
    pub lyrics: Option<String>,
}

/// Pipeline result: the verdict, and whether it was served from a prior
/// analysis of the same content
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisOutcome {
    pub verdict: Verdict,
    pub cached: bool,
}

#[derive(Clone)]
pub struct Analyzer {
    db: SqlitePool,
    fingerprinter: Arc<dyn FingerprintExtractor>,
    bias: Arc<dyn BiasClassifier>,
    transcriber: Arc<dyn Transcriber>,
    registry: RuleRegistry,
    searcher: SimilaritySearcher,
    verdicts: VerdictStore,
}

impl Analyzer {
    pub fn new(
        db: SqlitePool,
        fingerprinter: Arc<dyn FingerprintExtractor>,
        bias: Arc<dyn BiasClassifier>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            registry: RuleRegistry::new(db.clone()),
            searcher: SimilaritySearcher::new(db.clone()),
            verdicts: VerdictStore::new(db.clone()),
            db,
            fingerprinter,
            bias,
            transcriber,
        }
    }

    pub fn transcriber_available(&self) -> bool {
        self.transcriber.available()
    }

    /// Reject unsupported filename extensions before any work happens
    pub fn validate_extension(filename: &str) -> Result<()> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(Error::InvalidInput(format!(
                "Unsupported file type for '{}'; expected one of: {}",
                filename,
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }

    /// Run the full pipeline for one submission
    pub async fn analyze(&self, submission: Submission) -> Result<AnalysisOutcome> {
        Self::validate_extension(&submission.filename)?;

        if submission.bytes.is_empty() {
            return Err(Error::InvalidInput("Submitted file is empty".to_string()));
        }
        // Settings are free-form text; clamp so a nonsense value cannot
        // wipe out the gate or overflow the byte conversion
        let max_mb = settings::get_i64(
            &self.db,
            settings::MAX_FILE_SIZE_MB,
            DEFAULT_MAX_FILE_SIZE_MB,
        )
        .await?
        .max(1);
        let max_bytes = max_mb as usize * 1024 * 1024;
        if submission.bytes.len() > max_bytes {
            return Err(Error::InvalidInput(format!(
                "File exceeds the {} MB limit",
                max_mb
            )));
        }

        let bytes = Arc::new(submission.bytes);

        let hash_input = Arc::clone(&bytes);
        let content_hash = tokio::task::spawn_blocking(move || {
            let mut hasher = Sha256::new();
            hasher.update(hash_input.as_slice());
            format!("{:x}", hasher.finalize())
        })
        .await
        .map_err(|e| Error::Internal(format!("Hashing task failed: {}", e)))?;

        // Fast path: content already analyzed
        if let Some(verdict) = self.verdicts.fetch_by_hash(&content_hash).await? {
            tracing::info!(
                filename = %submission.filename,
                verdict_id = verdict.id,
                "Duplicate content, returning cached verdict"
            );
            return Ok(AnalysisOutcome { verdict, cached: true });
        }

        let fingerprinter = Arc::clone(&self.fingerprinter);
        let fp_input = Arc::clone(&bytes);
        let fingerprint =
            tokio::task::spawn_blocking(move || fingerprinter.extract(fp_input.as_slice()))
                .await
                .map_err(|e| Error::Internal(format!("Fingerprint task failed: {}", e)))?;

        let (plagiarism_score, similar_matches) = match &fingerprint {
            Some(vector) => {
                let (score, matches) = self
                    .searcher
                    .search_with_score(vector, DEFAULT_SIMILARITY_THRESHOLD)
                    .await?;
                (Some(score), matches)
            }
            None => {
                tracing::warn!(
                    filename = %submission.filename,
                    "Could not fingerprint submission, skipping similarity check"
                );
                (None, Vec::new())
            }
        };

        // Transcript preference: caller-provided lyrics, then transcription
        let (transcript, transcript_source) = match submission.lyrics {
            Some(lyrics) if !lyrics.trim().is_empty() => (Some(lyrics), TranscriptSource::Provided),
            _ => {
                let transcriber = Arc::clone(&self.transcriber);
                let audio = Arc::clone(&bytes);
                let filename = submission.filename.clone();
                let transcribed = tokio::task::spawn_blocking(move || {
                    transcriber.transcribe(audio.as_slice(), &filename)
                })
                .await
                .map_err(|e| Error::Internal(format!("Transcription task failed: {}", e)))?;
                match transcribed {
                    Some(text) => (Some(text), TranscriptSource::Transcribed),
                    None => (None, TranscriptSource::None),
                }
            }
        };

        let (bias_score, bias_details) = match &transcript {
            Some(text) => (self.bias.score(text), self.bias.details(text)),
            None => (None, None),
        };

        let snapshot = self.registry.snapshot().await?;
        let outcome = scorer::score(plagiarism_score, bias_score, &snapshot);

        let metadata = VerdictMetadata {
            plagiarism_score,
            bias_score,
            bias_details,
            transcript,
            transcript_source,
            file_size: bytes.len() as u64,
            extra: Default::default(),
        };

        self.persist(
            &submission.filename,
            &content_hash,
            &outcome,
            &metadata,
            &similar_matches,
            fingerprint.as_deref(),
        )
        .await
    }

    /// Write the verdict and fingerprint in one transaction.
    ///
    /// If another task persisted the same content hash between our dedup
    /// check and here, the insert is a no-op and we return its verdict.
    async fn persist(
        &self,
        filename: &str,
        content_hash: &str,
        outcome: &scorer::ScoreOutcome,
        metadata: &VerdictMetadata,
        similar_matches: &[museguard_common::db::models::SimilarMatch],
        fingerprint: Option<&[f32]>,
    ) -> Result<AnalysisOutcome> {
        let issues_json = serde_json::to_string(&outcome.issues)
            .map_err(|e| Error::Internal(format!("Failed to serialize issues: {}", e)))?;
        let recommendations_json = serde_json::to_string(&outcome.recommendations)
            .map_err(|e| Error::Internal(format!("Failed to serialize recommendations: {}", e)))?;
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;
        let similar_json = serde_json::to_string(similar_matches)
            .map_err(|e| Error::Internal(format!("Failed to serialize matches: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO verdicts (filename, content_hash, compliance_score, issues,
                                  recommendations, metadata, similar_matches, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
        )
        .bind(filename)
        .bind(content_hash)
        .bind(outcome.compliance_score)
        .bind(&issues_json)
        .bind(&recommendations_json)
        .bind(&metadata_json)
        .bind(&similar_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race to a concurrent identical submission
            tx.rollback().await?;
            let verdict = self
                .verdicts
                .fetch_by_hash(content_hash)
                .await?
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "Verdict for hash {} vanished after conflict",
                        content_hash
                    ))
                })?;
            tracing::info!(
                filename,
                verdict_id = verdict.id,
                "Concurrent duplicate, returning winning verdict"
            );
            return Ok(AnalysisOutcome { verdict, cached: true });
        }

        let verdict_id = result.last_insert_rowid();
        if let Some(vector) = fingerprint {
            store_fingerprint(&mut *tx, content_hash, vector, verdict_id).await?;
        }
        tx.commit().await?;

        let verdict = self.verdicts.fetch_by_id(verdict_id).await?;
        tracing::info!(
            filename,
            verdict_id,
            compliance_score = verdict.compliance_score,
            issues = verdict.issues.len(),
            "Analysis completed"
        );
        Ok(AnalysisOutcome { verdict, cached: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{KeywordBiasClassifier, SpectralFingerprinter, UnavailableTranscriber};

    async fn analyzer() -> Analyzer {
        let pool = museguard_common::db::init_memory_pool().await.unwrap();
        Analyzer::new(
            pool,
            Arc::new(SpectralFingerprinter),
            Arc::new(KeywordBiasClassifier),
            Arc::new(UnavailableTranscriber),
        )
    }

    fn submission(filename: &str, bytes: Vec<u8>, lyrics: Option<&str>) -> Submission {
        Submission {
            filename: filename.to_string(),
            bytes,
            lyrics: lyrics.map(str::to_string),
        }
    }

    /// 4 KiB of deterministic pseudo-audio
    fn audio(seed: u8) -> Vec<u8> {
        (0..4096u32)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn test_extension_validation() {
        assert!(Analyzer::validate_extension("song.mp3").is_ok());
        assert!(Analyzer::validate_extension("SONG.WAV").is_ok());
        assert!(Analyzer::validate_extension("notes.txt").is_err());
        assert!(Analyzer::validate_extension("no_extension").is_err());
    }

    #[tokio::test]
    async fn test_empty_file_rejected_before_persistence() {
        let analyzer = analyzer().await;
        let result = analyzer.analyze(submission("song.mp3", Vec::new(), None)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let analyzer = analyzer().await;
        settings::set(&analyzer.db, settings::MAX_FILE_SIZE_MB, "1").await.unwrap();

        let big = vec![0u8; 2 * 1024 * 1024];
        let result = analyzer.analyze(submission("song.mp3", big, None)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verdicts")
            .fetch_one(&analyzer.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_negative_size_setting_clamped_to_one_mb() {
        let analyzer = analyzer().await;
        settings::set(&analyzer.db, settings::MAX_FILE_SIZE_MB, "-1").await.unwrap();

        // A small file passes the clamped 1 MB gate without arithmetic trouble
        let outcome = analyzer
            .analyze(submission("song.mp3", audio(11), None))
            .await
            .unwrap();
        assert!(!outcome.cached);

        // And the gate still rejects something over 1 MB
        let result = analyzer
            .analyze(submission("big.mp3", vec![0u8; 2 * 1024 * 1024], None))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_clean_submission_scores_and_persists() {
        let analyzer = analyzer().await;
        let outcome = analyzer
            .analyze(submission("song.mp3", audio(1), Some("sunny days and open roads")))
            .await
            .unwrap();

        assert!(!outcome.cached);
        assert!(outcome.verdict.issues.is_empty());
        assert!(outcome.verdict.compliance_score > 0.9);
        assert_eq!(
            outcome.verdict.metadata.transcript_source,
            TranscriptSource::Provided
        );
        // Empty corpus: no match cleared the threshold
        assert_eq!(outcome.verdict.metadata.plagiarism_score, Some(0.0));
        assert_eq!(outcome.verdict.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_resubmission_returns_cached_verdict() {
        let analyzer = analyzer().await;
        let first = analyzer
            .analyze(submission("song.mp3", audio(2), None))
            .await
            .unwrap();
        let second = analyzer
            .analyze(submission("renamed.mp3", audio(2), None))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.verdict.id, second.verdict.id);
        // Original filename sticks
        assert_eq!(second.verdict.filename, "song.mp3");

        let fingerprints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&analyzer.db)
            .await
            .unwrap();
        assert_eq!(fingerprints, 1);
    }

    #[tokio::test]
    async fn test_identical_content_flags_copyright_on_second_distinct_file() {
        let analyzer = analyzer().await;
        analyzer.analyze(submission("a.mp3", audio(3), None)).await.unwrap();

        // Same bytes with one flipped region: near-identical fingerprint
        let mut close = audio(3);
        close[0] = close[0].wrapping_add(1);
        let outcome = analyzer.analyze(submission("b.mp3", close, None)).await.unwrap();

        assert!(!outcome.cached);
        let plagiarism = outcome.verdict.metadata.plagiarism_score.unwrap();
        assert!(plagiarism > 0.5, "plagiarism score was {}", plagiarism);
        assert!(outcome
            .verdict
            .issues
            .iter()
            .any(|i| i.family == museguard_common::db::models::RuleFamily::Copyright));
        assert_eq!(outcome.verdict.similar_matches.len(), 1);
    }

    #[tokio::test]
    async fn test_toxic_lyrics_flag_bias() {
        let analyzer = analyzer().await;
        let lyrics = "hate hate kill die stupid idiot racist discrimination";
        let outcome = analyzer
            .analyze(submission("song.mp3", audio(4), Some(lyrics)))
            .await
            .unwrap();

        let bias = outcome.verdict.metadata.bias_score.unwrap();
        assert!(bias > 0.4, "bias score was {}", bias);
        assert!(outcome
            .verdict
            .issues
            .iter()
            .any(|i| i.family == museguard_common::db::models::RuleFamily::Bias));
        assert!(outcome.verdict.metadata.bias_details.is_some());
    }

    #[tokio::test]
    async fn test_no_lyrics_no_transcriber_leaves_bias_absent() {
        let analyzer = analyzer().await;
        let outcome = analyzer
            .analyze(submission("song.mp3", audio(5), None))
            .await
            .unwrap();

        assert_eq!(outcome.verdict.metadata.bias_score, None);
        assert_eq!(
            outcome.verdict.metadata.transcript_source,
            TranscriptSource::None
        );
        // Only copyright contributes; clean corpus gives a perfect subscore
        assert!((outcome.verdict.compliance_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_identical_submissions_converge() {
        let analyzer = analyzer().await;
        let bytes = audio(6);

        let mut handles = Vec::new();
        for i in 0..8 {
            let analyzer = analyzer.clone();
            let sub = submission(&format!("copy{}.mp3", i), bytes.clone(), None);
            handles.push(tokio::spawn(async move { analyzer.analyze(sub).await }));
        }

        let mut ids = Vec::new();
        let mut fresh = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if !outcome.cached {
                fresh += 1;
            }
            ids.push(outcome.verdict.id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1, "all submissions must converge on one verdict");
        assert_eq!(fresh, 1, "exactly one submission computes the verdict");

        let verdicts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verdicts")
            .fetch_one(&analyzer.db)
            .await
            .unwrap();
        assert_eq!(verdicts, 1);
        let fingerprints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&analyzer.db)
            .await
            .unwrap();
        assert_eq!(fingerprints, 1);
    }

    #[tokio::test]
    async fn test_tiny_file_analyzed_without_fingerprint() {
        let analyzer = analyzer().await;
        // Under one frame: unfingerprintable, still analyzed
        let outcome = analyzer
            .analyze(submission("song.mp3", vec![7u8; 100], Some("clean words")))
            .await
            .unwrap();

        assert_eq!(outcome.verdict.metadata.plagiarism_score, None);
        assert!(outcome.verdict.similar_matches.is_empty());

        let fingerprints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
            .fetch_one(&analyzer.db)
            .await
            .unwrap();
        assert_eq!(fingerprints, 0);
    }
}
