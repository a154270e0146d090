//! Deterministic risk scoring over the merged finding set.

use crate::config::ScoringConfig;
use crate::core::Finding;
use std::collections::HashMap;

pub const MAX_RISK_SCORE: f64 = 100.0;

/// Sums severity weights with diminishing returns for repeated categories.
/// Pure arithmetic over the findings: same inputs, same score.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// The most severe finding of each category contributes its full
    /// weight; further findings of that category are scaled by the repeat
    /// factor. Synthetic diagnostics do not score. Capped at 100.
    pub fn score(&self, findings: &[Finding]) -> f64 {
        let mut ordered: Vec<&Finding> = findings
            .iter()
            .filter(|f| !f.category.is_synthetic())
            .collect();
        ordered.sort_by(|a, b| b.severity.cmp(&a.severity));

        let mut repeats: HashMap<String, usize> = HashMap::new();
        let mut total = 0.0;
        for finding in ordered {
            let weight = self.config.severity_weights.weight(finding.severity);
            let count = repeats.entry(finding.category.as_str().to_string()).or_insert(0);
            total += if *count == 0 {
                weight
            } else {
                weight * self.config.repeat_factor
            };
            *count += 1;
        }
        total.min(MAX_RISK_SCORE)
    }
}
