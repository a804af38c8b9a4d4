use crate::config::Policy;
use crate::types::Finding;
use std::collections::BTreeMap;

/// Weight for rules absent from the table
pub const DEFAULT_RULE_WEIGHT: f64 = 1.0;

/// Score and verdict for one set of findings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    /// Unrounded score in `[0, 1]`
    pub score: f64,
    pub overall_pass: bool,
}

impl ScoreOutcome {
    /// Score rounded to 4 decimals, as reported
    pub fn reported_score(&self) -> f64 {
        round_score(self.score)
    }
}

pub fn weight_of(rule: &str, weights: &BTreeMap<String, f64>) -> f64 {
    weights.get(rule).copied().unwrap_or(DEFAULT_RULE_WEIGHT)
}

/// Weighted share of passing findings.
///
/// No findings, or a non-positive total weight, scores 1.0. Summation runs
/// over sorted weights so the result does not depend on finding order.
pub fn score(findings: &[Finding], weights: &BTreeMap<String, f64>) -> f64 {
    let mut weighted: Vec<(f64, bool)> = findings
        .iter()
        .map(|finding| (weight_of(&finding.rule, weights), finding.pass))
        .collect();
    weighted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    // Folds start at +0.0; an empty `f64` sum is -0.0
    let total = weighted.iter().fold(0.0, |acc, (weight, _)| acc + weight);
    let earned = weighted
        .iter()
        .filter(|(_, pass)| *pass)
        .fold(0.0, |acc, (weight, _)| acc + weight);

    if total.is_nan() || total <= 0.0 {
        return 1.0;
    }
    (earned / total).clamp(0.0, 1.0)
}

/// Score against the policy's weights and compare with its threshold.
pub fn evaluate(findings: &[Finding], policy: &Policy) -> ScoreOutcome {
    let score = score(findings, policy.effective_weights());
    ScoreOutcome {
        score,
        overall_pass: score >= policy.pass_threshold,
    }
}

pub fn round_score(score: f64) -> f64 {
    let rounded = (score * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
