//! Text bias / toxicity classification boundary
//!
//! The engine consumes an `Option<f64>` in [0, 1]: `None` when there is no
//! text or the model is unavailable. The built-in classifier is a keyword
//! scorer; a transformer-backed classifier plugs in at the same trait.

use museguard_common::db::models::{BiasCategory, BiasDetails, FlaggedWord, LineFinding, Severity};

/// Classification seam for the text-bias model
pub trait BiasClassifier: Send + Sync {
    /// Score text for bias/toxicity likelihood in [0, 1].
    /// `None` when text is empty or the model is unavailable.
    fn score(&self, text: &str) -> Option<f64>;

    /// Detailed per-category and per-line breakdown for operator review.
    /// `None` under the same conditions as [`score`](Self::score).
    fn details(&self, text: &str) -> Option<BiasDetails>;
}

const HATE_KEYWORDS: &[&str] = &["hate", "racist", "sexist", "homophobic", "discrimination"];
const OFFENSIVE_KEYWORDS: &[&str] = &["stupid", "idiot", "moron", "dumb", "loser", "pathetic"];
const RACIAL_KEYWORDS: &[&str] = &["race", "color", "ethnic", "minority"];
const GENDER_KEYWORDS: &[&str] = &["gender", "masculine", "feminine"];

const OVERALL_KEYWORDS: &[&str] = &[
    "hate", "kill", "die", "stupid", "idiot", "moron", "racist", "sexist", "discrimination",
];

// Amplification factors per category: keyword density is tiny relative to
// total word count, so each density is scaled before clamping to [0, 1].
const OVERALL_GAIN: f64 = 5.0;
const HATE_GAIN: f64 = 10.0;
const OFFENSIVE_GAIN: f64 = 8.0;
const CATEGORY_GAIN: f64 = 6.0;

/// Built-in keyword-density classifier
#[derive(Debug, Default, Clone)]
pub struct KeywordBiasClassifier;

impl KeywordBiasClassifier {
    fn density_score(text_lower: &str, word_count: usize, keywords: &[&str], gain: f64) -> f64 {
        if word_count == 0 {
            return 0.0;
        }
        let hits = keywords.iter().filter(|k| text_lower.contains(*k)).count();
        (hits as f64 / word_count as f64 * gain).min(1.0)
    }

    fn categorize(word: &str) -> Option<(BiasCategory, Severity)> {
        let w = word.to_lowercase();
        let w = w.trim_matches(|c: char| c.is_ascii_punctuation());
        if HATE_KEYWORDS.contains(&w) {
            Some((BiasCategory::HateSpeech, Severity::High))
        } else if OFFENSIVE_KEYWORDS.contains(&w) {
            Some((BiasCategory::Offensive, Severity::Medium))
        } else if RACIAL_KEYWORDS.contains(&w) {
            Some((BiasCategory::Racial, Severity::Medium))
        } else if GENDER_KEYWORDS.contains(&w) {
            Some((BiasCategory::Gender, Severity::Medium))
        } else {
            None
        }
    }

    fn analyze_line(line: &str) -> (f64, Vec<BiasCategory>) {
        let lower = line.to_lowercase();
        let mut score = 0.0f64;
        let mut categories = Vec::new();

        if HATE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            categories.push(BiasCategory::HateSpeech);
            score += 0.8;
        }
        if OFFENSIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            categories.push(BiasCategory::Offensive);
            score += 0.6;
        }
        if RACIAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            categories.push(BiasCategory::Racial);
            score += 0.4;
        }
        if GENDER_KEYWORDS.iter().any(|k| lower.contains(k)) {
            categories.push(BiasCategory::Gender);
            score += 0.4;
        }

        (score.min(1.0), categories)
    }
}

impl BiasClassifier for KeywordBiasClassifier {
    fn score(&self, text: &str) -> Option<f64> {
        let cleaned = text.trim();
        if cleaned.is_empty() {
            return None;
        }

        let lower = cleaned.to_lowercase();
        let word_count = cleaned.split_whitespace().count();
        Some(Self::density_score(&lower, word_count, OVERALL_KEYWORDS, OVERALL_GAIN))
    }

    fn details(&self, text: &str) -> Option<BiasDetails> {
        let cleaned = text.trim();
        if cleaned.is_empty() {
            return None;
        }

        let lower = cleaned.to_lowercase();
        let word_count = cleaned.split_whitespace().count();

        let flagged_words: Vec<FlaggedWord> = cleaned
            .split_whitespace()
            .enumerate()
            .filter_map(|(position, word)| {
                Self::categorize(word).map(|(category, severity)| FlaggedWord {
                    word: word.to_string(),
                    position,
                    category,
                    severity,
                })
            })
            .collect();

        let mut line_findings = Vec::new();
        let mut total_lines = 0;
        for (index, line) in cleaned.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            total_lines += 1;
            let (score, categories) = Self::analyze_line(line);
            // Only lines with a meaningful signal are reported
            if score > 0.1 {
                line_findings.push(LineFinding {
                    line_number: index + 1,
                    text: line.trim().to_string(),
                    score,
                    categories,
                });
            }
        }

        Some(BiasDetails {
            overall_toxicity: Self::density_score(&lower, word_count, OVERALL_KEYWORDS, OVERALL_GAIN),
            hate_speech: Self::density_score(&lower, word_count, HATE_KEYWORDS, HATE_GAIN),
            offensive_language: Self::density_score(&lower, word_count, OFFENSIVE_KEYWORDS, OFFENSIVE_GAIN),
            racial_bias: Self::density_score(&lower, word_count, RACIAL_KEYWORDS, CATEGORY_GAIN),
            gender_bias: Self::density_score(&lower, word_count, GENDER_KEYWORDS, CATEGORY_GAIN),
            flagged_lines: line_findings.len(),
            flagged_words,
            line_findings,
            total_lines,
        })
    }
}
