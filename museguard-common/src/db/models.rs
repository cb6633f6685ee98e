//! Persisted data models for the MuseGuard compliance engine
//!
//! Timestamps are stored as RFC 3339 UTC strings. Uniform formatting makes
//! lexicographic comparison in SQL agree with chronological order, so
//! trailing-window queries can bind plain strings.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the three scored rule families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleFamily {
    /// Plagiarism / similarity against the stored corpus
    Copyright,
    /// Lyrics bias and toxicity
    Bias,
    /// Explicit content filtering (scored from the bias signal)
    Content,
}

impl RuleFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Copyright => "copyright",
            RuleFamily::Bias => "bias",
            RuleFamily::Content => "content",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copyright" => Ok(RuleFamily::Copyright),
            "bias" => Ok(RuleFamily::Bias),
            "content" => Ok(RuleFamily::Content),
            other => Err(Error::InvalidInput(format!("Unknown rule family: {}", other))),
        }
    }
}

/// A compliance rule, keyed by (rule_type, rule_name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub rule_type: RuleFamily,
    pub rule_name: String,
    pub threshold: f64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single detected compliance issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub family: RuleFamily,
    pub severity: Severity,
    /// The subscore that triggered the issue, in [0, 1]
    pub confidence: f64,
    pub detail: String,
}

/// A stored fingerprint that cleared the similarity threshold for a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub verdict_id: i64,
    pub filename: String,
    pub similarity: f64,
    pub compliance_score: f64,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Where the transcript used for bias scoring came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Provided,
    Transcribed,
    /// Edited post-hoc by an operator
    Edited,
    #[default]
    None,
}

/// Bias category for detailed findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasCategory {
    HateSpeech,
    Offensive,
    Racial,
    Gender,
}

/// A flagged word with its position in the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedWord {
    pub word: String,
    pub position: usize,
    pub category: BiasCategory,
    pub severity: Severity,
}

/// Per-line bias finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineFinding {
    pub line_number: usize,
    pub text: String,
    pub score: f64,
    pub categories: Vec<BiasCategory>,
}

/// Detailed bias breakdown attached to verdict metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BiasDetails {
    pub overall_toxicity: f64,
    pub hate_speech: f64,
    pub offensive_language: f64,
    pub racial_bias: f64,
    pub gender_bias: f64,
    pub flagged_words: Vec<FlaggedWord>,
    pub line_findings: Vec<LineFinding>,
    pub total_lines: usize,
    pub flagged_lines: usize,
}

/// Typed verdict metadata
///
/// Replaces the original free-form metadata bag with known optional fields.
/// `extra` remains for forward compatibility; nothing in the engine writes
/// to it today.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerdictMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plagiarism_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_details: Option<BiasDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default)]
    pub transcript_source: TranscriptSource,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The persisted outcome of one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub id: i64,
    pub filename: String,
    pub content_hash: String,
    pub compliance_score: f64,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
    pub metadata: VerdictMetadata,
    #[serde(default)]
    pub similar_matches: Vec<SimilarMatch>,
    pub created_at: DateTime<Utc>,
}

/// Raw verdict row as stored: JSON columns still serialized
pub type VerdictRow = (
    i64,            // id
    String,         // filename
    String,         // content_hash
    f64,            // compliance_score
    String,         // issues JSON
    String,         // recommendations JSON
    String,         // metadata JSON
    Option<String>, // similar_matches JSON
    String,         // created_at RFC 3339
);

/// Column list matching [`VerdictRow`], for SELECT statements
pub const VERDICT_COLUMNS: &str = "id, filename, content_hash, compliance_score, issues, \
                                   recommendations, metadata, similar_matches, created_at";

impl Verdict {
    /// Decode a raw database row into a typed verdict
    pub fn decode(row: VerdictRow) -> Result<Self> {
        let (id, filename, content_hash, compliance_score, issues, recommendations, metadata, similar, created_at) =
            row;

        let issues: Vec<Issue> = serde_json::from_str(&issues)
            .map_err(|e| Error::Internal(format!("Corrupt issues JSON for verdict {}: {}", id, e)))?;
        let recommendations: Vec<String> = serde_json::from_str(&recommendations).map_err(|e| {
            Error::Internal(format!("Corrupt recommendations JSON for verdict {}: {}", id, e))
        })?;
        let metadata: VerdictMetadata = serde_json::from_str(&metadata)
            .map_err(|e| Error::Internal(format!("Corrupt metadata JSON for verdict {}: {}", id, e)))?;
        let similar_matches: Vec<SimilarMatch> = match similar {
            Some(json) if !json.is_empty() => serde_json::from_str(&json).map_err(|e| {
                Error::Internal(format!("Corrupt similar_matches JSON for verdict {}: {}", id, e))
            })?,
            _ => Vec::new(),
        };

        Ok(Verdict {
            id,
            filename,
            content_hash,
            compliance_score,
            issues,
            recommendations,
            metadata,
            similar_matches,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Feedback classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Correct,
    Incorrect,
    Partial,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Correct => "correct",
            FeedbackKind::Incorrect => "incorrect",
            FeedbackKind::Partial => "partial",
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "correct" => Ok(FeedbackKind::Correct),
            "incorrect" => Ok(FeedbackKind::Incorrect),
            "partial" => Ok(FeedbackKind::Partial),
            other => Err(Error::InvalidInput(format!("Unknown feedback type: {}", other))),
        }
    }
}

/// One appended feedback record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub verdict_id: i64,
    pub feedback_type: FeedbackKind,
    pub details: Option<String>,
    pub reporter: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_family_round_trip() {
        for family in [RuleFamily::Copyright, RuleFamily::Bias, RuleFamily::Content] {
            assert_eq!(family.as_str().parse::<RuleFamily>().unwrap(), family);
        }
        assert!("melody".parse::<RuleFamily>().is_err());
    }

    #[test]
    fn test_issue_serializes_type_field() {
        let issue = Issue {
            family: RuleFamily::Copyright,
            severity: Severity::High,
            confidence: 0.92,
            detail: "High similarity detected (score: 0.92)".to_string(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "copyright");
        assert_eq!(json["severity"], "high");
    }

    #[test]
    fn test_verdict_decode_defaults() {
        let row: VerdictRow = (
            7,
            "song.mp3".to_string(),
            "ab".repeat(32),
            0.85,
            "[]".to_string(),
            r#"["Content appears to meet compliance standards"]"#.to_string(),
            "{}".to_string(),
            None,
            Utc::now().to_rfc3339(),
        );
        let verdict = Verdict::decode(row).unwrap();
        assert_eq!(verdict.id, 7);
        assert!(verdict.issues.is_empty());
        assert!(verdict.similar_matches.is_empty());
        assert_eq!(verdict.metadata.transcript_source, TranscriptSource::None);
    }

    #[test]
    fn test_verdict_decode_rejects_corrupt_json() {
        let row: VerdictRow = (
            1,
            "x".to_string(),
            "h".to_string(),
            0.0,
            "not json".to_string(),
            "[]".to_string(),
            "{}".to_string(),
            None,
            Utc::now().to_rfc3339(),
        );
        assert!(Verdict::decode(row).is_err());
    }

    #[test]
    fn test_metadata_round_trip() {
        let metadata = VerdictMetadata {
            plagiarism_score: Some(0.5),
            bias_score: None,
            bias_details: None,
            transcript: Some("la la la".to_string()),
            transcript_source: TranscriptSource::Transcribed,
            file_size: 1024,
            extra: BTreeMap::new(),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let back: VerdictMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plagiarism_score, Some(0.5));
        assert_eq!(back.bias_score, None);
        assert_eq!(back.transcript_source, TranscriptSource::Transcribed);
    }

    #[test]
    fn test_timestamp_ordering_is_lexicographic() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(5);
        assert!(earlier.to_rfc3339() < later.to_rfc3339());
    }
}
