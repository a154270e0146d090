//! Normalization and deduplication. Model findings get their categories
//! resolved and their lines snapped to statement boundaries, then both
//! analyzers' outputs are folded so one issue surfaces exactly once.
//!
//! `merge_pair` is commutative and idempotent: merge order cannot change
//! a result, and re-merging a merged finding with either of its inputs is
//! a no-op. The per-side confidence memo on each merged finding is what
//! makes the second property hold.

use crate::config::MergeConfig;
use crate::core::{
    compare_findings, Category, Finding, FindingSource, MergeSides, SynonymMap,
};
use crate::static_analysis::StatementIndex;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Confidence ceiling for model categories that resolve to nothing in the
/// taxonomy or the synonym table.
pub const UNMAPPED_CONFIDENCE_CAP: f64 = 0.35;

const STATIC_WEIGHT_PATTERN: f64 = 0.7;
const STATIC_WEIGHT_SEMANTIC: f64 = 0.4;

pub fn reconcile(
    static_findings: Vec<Finding>,
    model_findings: Vec<Finding>,
    statements: &StatementIndex,
    merge: &MergeConfig,
    synonyms: &SynonymMap,
) -> Vec<Finding> {
    let tolerance = merge.line_tolerance;
    let model_findings: Vec<Finding> = model_findings
        .into_iter()
        .map(|f| normalize_model_finding(f, statements, synonyms))
        .collect();

    let static_pool = collapse_within_source(static_findings, tolerance);
    let model_pool = collapse_within_source(model_findings, tolerance);

    let mut merged = static_pool;
    for model_finding in model_pool {
        let candidate = merged
            .iter()
            .enumerate()
            .filter(|(_, existing)| same_issue(existing, &model_finding, tolerance))
            .min_by_key(|(idx, existing)| {
                (
                    existing.location.line.abs_diff(model_finding.location.line),
                    existing.location.line,
                    *idx,
                )
            })
            .map(|(idx, _)| idx);
        match candidate {
            Some(idx) => {
                let existing = merged[idx].clone();
                merged[idx] = merge_pair(existing, model_finding);
            }
            None => merged.push(model_finding),
        }
    }

    // No two findings may share (category, file, line, column).
    merged.sort_by(compare_findings);
    let mut seen: HashSet<(Category, String, usize, usize)> = HashSet::new();
    merged.retain(|f| seen.insert(f.issue_key()));
    merged
}

/// Folds two reports of the same issue into one finding.
pub fn merge_pair(a: Finding, b: Finding) -> Finding {
    let (primary, secondary) = if primary_first(&a, &b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    };

    let severity = primary.severity.max(secondary.severity);
    let primary_sides = effective_sides(&primary);
    let secondary_sides = effective_sides(&secondary);
    let sides = MergeSides {
        static_confidence: combine_side(
            primary_sides.static_confidence,
            secondary_sides.static_confidence,
        ),
        model_confidence: combine_side(
            primary_sides.model_confidence,
            secondary_sides.model_confidence,
        ),
    };

    let confidence = match (sides.static_confidence, sides.model_confidence) {
        (Some(s), Some(m)) => {
            let w = static_weight(&primary.category);
            w * s + (1.0 - w) * m
        }
        (Some(s), None) => s,
        (None, Some(m)) => m,
        (None, None) => primary.confidence,
    };

    let source = match (sides.static_confidence.is_some(), sides.model_confidence.is_some()) {
        (true, true) => FindingSource::Merged,
        (true, false) => FindingSource::Static,
        _ => FindingSource::Model,
    };

    let mut location = primary.location.clone();
    if location.snippet.is_none() {
        location.snippet = secondary.location.snippet.clone();
    }

    Finding {
        rule_id: primary.rule_id,
        category: primary.category,
        severity,
        confidence: confidence.clamp(0.0, 1.0),
        description: primary.description,
        source,
        location,
        merge_sides: Some(sides),
    }
}

fn normalize_model_finding(
    mut finding: Finding,
    statements: &StatementIndex,
    synonyms: &SynonymMap,
) -> Finding {
    if let Category::Other(raw) = &finding.category {
        match synonyms.resolve(raw) {
            Some(category) => finding.category = category,
            None => finding.confidence = finding.confidence.min(UNMAPPED_CONFIDENCE_CAP),
        }
    }
    if !finding.category.is_synthetic() {
        finding.location.line = statements.snap(finding.location.line);
    }
    finding
}

fn collapse_within_source(mut findings: Vec<Finding>, tolerance: usize) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        a.location
            .line
            .cmp(&b.location.line)
            .then_with(|| a.location.column.cmp(&b.location.column))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    let mut pool: Vec<Finding> = Vec::new();
    for finding in findings {
        match pool
            .iter()
            .position(|existing| same_issue(existing, &finding, tolerance))
        {
            Some(idx) => {
                let existing = pool[idx].clone();
                pool[idx] = merge_pair(existing, finding);
            }
            None => pool.push(finding),
        }
    }
    pool
}

fn same_issue(a: &Finding, b: &Finding, tolerance: usize) -> bool {
    a.category == b.category
        && a.location.file == b.location.file
        && a.location.line.abs_diff(b.location.line) <= tolerance
}

/// Total order picking which input a merged finding inherits its identity
/// from. Static beats merged beats model; ties fall to severity, then
/// confidence, then position.
fn primary_first(a: &Finding, b: &Finding) -> Ordering {
    source_rank(a.source)
        .cmp(&source_rank(b.source))
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.location.line.cmp(&b.location.line))
        .then_with(|| a.location.column.cmp(&b.location.column))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
        .then_with(|| a.description.cmp(&b.description))
}

fn source_rank(source: FindingSource) -> u8 {
    match source {
        FindingSource::Static => 0,
        FindingSource::Merged => 1,
        FindingSource::Model => 2,
    }
}

fn effective_sides(finding: &Finding) -> MergeSides {
    if let Some(sides) = finding.merge_sides {
        return sides;
    }
    match finding.source {
        FindingSource::Static => MergeSides {
            static_confidence: Some(finding.confidence),
            model_confidence: None,
        },
        FindingSource::Model => MergeSides {
            static_confidence: None,
            model_confidence: Some(finding.confidence),
        },
        FindingSource::Merged => MergeSides {
            static_confidence: Some(finding.confidence),
            model_confidence: Some(finding.confidence),
        },
    }
}

fn combine_side(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn static_weight(category: &Category) -> f64 {
    if category.pattern_based() {
        STATIC_WEIGHT_PATTERN
    } else {
        STATIC_WEIGHT_SEMANTIC
    }
}
