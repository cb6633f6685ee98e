//! Weighted compliance scoring
//!
//! Pure functions from (subscores, rule snapshot) to score, issues, and
//! recommendations. A missing subscore or a disabled rule excludes that
//! family from the weighted sum entirely; "signal absent" is never treated
//! as "confirmed clean".

use museguard_common::db::models::{Issue, RuleFamily, Severity};

/// Family weights in the compliance average
const COPYRIGHT_WEIGHT: f64 = 0.5;
const BIAS_WEIGHT: f64 = 0.3;
const CONTENT_WEIGHT: f64 = 0.2;

/// Subscores above these cutoffs escalate an issue to high severity
const COPYRIGHT_HIGH_CUTOFF: f64 = 0.8;
const BIAS_HIGH_CUTOFF: f64 = 0.7;
const CONTENT_HIGH_CUTOFF: f64 = 0.8;

/// The (threshold, enabled) pair for one rule, read atomically
#[derive(Debug, Clone, Copy)]
pub struct RuleState {
    pub threshold: f64,
    pub enabled: bool,
}

/// Consistent snapshot of the three scoring rules.
///
/// Loaded in a single query before scoring starts; the scorer never
/// re-reads the registry mid-pass, so a concurrent threshold update cannot
/// produce a torn read.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSnapshot {
    pub copyright: Option<RuleState>,
    pub bias: Option<RuleState>,
    pub content: Option<RuleState>,
}

/// Scoring result
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Overall compliance in [0, 1]; higher is more compliant
    pub compliance_score: f64,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

/// Score one analysis from its subscores and the rule snapshot
pub fn score(
    plagiarism: Option<f64>,
    bias: Option<f64>,
    rules: &RuleSnapshot,
) -> ScoreOutcome {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    let copyright = contributing(rules.copyright, plagiarism);
    if let Some((_, subscore)) = copyright {
        weighted_sum += (1.0 - subscore) * COPYRIGHT_WEIGHT;
        weight_total += COPYRIGHT_WEIGHT;
    }

    let bias_family = contributing(rules.bias, bias);
    if let Some((_, subscore)) = bias_family {
        weighted_sum += (1.0 - subscore) * BIAS_WEIGHT;
        weight_total += BIAS_WEIGHT;
    }

    // The content family scores explicit content from the bias signal
    let content = contributing(rules.content, bias);
    if let Some((_, subscore)) = content {
        weighted_sum += (1.0 - subscore) * CONTENT_WEIGHT;
        weight_total += CONTENT_WEIGHT;
    }

    let compliance_score = if weight_total > 0.0 {
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut issues = Vec::new();
    if let Some((rule, subscore)) = copyright {
        if subscore > rule.threshold {
            issues.push(make_issue(
                RuleFamily::Copyright,
                subscore,
                COPYRIGHT_HIGH_CUTOFF,
                format!("High similarity detected (score: {:.2})", subscore),
            ));
        }
    }
    if let Some((rule, subscore)) = bias_family {
        if subscore > rule.threshold {
            issues.push(make_issue(
                RuleFamily::Bias,
                subscore,
                BIAS_HIGH_CUTOFF,
                format!("Potential bias/toxicity detected (score: {:.2})", subscore),
            ));
        }
    }
    if let Some((rule, subscore)) = content {
        if subscore > rule.threshold {
            issues.push(make_issue(
                RuleFamily::Content,
                subscore,
                CONTENT_HIGH_CUTOFF,
                format!("Explicit content detected (score: {:.2})", subscore),
            ));
        }
    }

    let recommendations = recommendations_for(&issues);

    ScoreOutcome {
        compliance_score,
        issues,
        recommendations,
    }
}

/// A family contributes only when its rule exists, is enabled, and its
/// subscore is present
fn contributing(rule: Option<RuleState>, subscore: Option<f64>) -> Option<(RuleState, f64)> {
    match (rule, subscore) {
        (Some(rule), Some(subscore)) if rule.enabled => Some((rule, subscore)),
        _ => None,
    }
}

fn make_issue(family: RuleFamily, subscore: f64, high_cutoff: f64, detail: String) -> Issue {
    Issue {
        family,
        severity: if subscore > high_cutoff {
            Severity::High
        } else {
            Severity::Medium
        },
        confidence: subscore,
        detail,
    }
}

/// Deterministic recommendation templates keyed off issue type and
/// severity. Pure: same issue list in, same strings out.
pub fn recommendations_for(issues: &[Issue]) -> Vec<String> {
    let mut recommendations = Vec::new();

    for issue in issues {
        match issue.family {
            RuleFamily::Copyright => {
                recommendations.push("Consider modifying melody, harmony, or rhythm patterns".to_string());
                recommendations.push("Increase musical novelty and originality".to_string());
                if issue.severity == Severity::High {
                    recommendations.push(
                        "Significant changes required to avoid copyright infringement".to_string(),
                    );
                }
            }
            RuleFamily::Bias => {
                recommendations.push("Review lyrics for potentially offensive content".to_string());
                recommendations.push("Consider alternative word choices or themes".to_string());
                if issue.severity == Severity::High {
                    recommendations.push(
                        "Content revision strongly recommended before publication".to_string(),
                    );
                }
            }
            RuleFamily::Content => {
                recommendations.push("Review explicit content before release".to_string());
                if issue.severity == Severity::High {
                    recommendations.push("Add an explicit content advisory label".to_string());
                }
            }
        }
    }

    if recommendations.is_empty() {
        recommendations.push("Content appears to meet compliance standards".to_string());
    }

    recommendations
}
