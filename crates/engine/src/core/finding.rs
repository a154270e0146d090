use crate::core::{Category, Severity};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_line: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_column: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub snippet: Option<String>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line: None,
            end_column: None,
            snippet: None,
        }
    }

    pub fn with_end(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = Some(end_line);
        self.end_column = Some(end_column);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Which analyzer produced a finding. `Merged` means the normalizer folded
/// a static and a model finding for the same issue into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Static,
    Model,
    Merged,
}

/// Best per-side confidences observed across merges. Carrying these makes
/// re-merging a merged finding with either of its inputs a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MergeSides {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub static_confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model_confidence: Option<f64>,
}

/// One reported vulnerability instance. Immutable after construction;
/// merging produces a new `Finding` rather than mutating inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub source: FindingSource,
    pub location: Location,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub merge_sides: Option<MergeSides>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        category: Category,
        severity: Severity,
        confidence: f64,
        description: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            category,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            description: description.into(),
            source: FindingSource::Static,
            location,
            merge_sides: None,
        }
    }

    pub fn with_source(mut self, source: FindingSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.location.snippet = Some(snippet.into());
        self
    }

    /// The uniqueness key the normalizer enforces: no two findings in one
    /// result share a category and an exact location.
    pub fn issue_key(&self) -> (Category, String, usize, usize) {
        (
            self.category.clone(),
            self.location.file.clone(),
            self.location.line,
            self.location.column,
        )
    }
}

/// Canonical result order: severity descending, then location ascending,
/// with category and rule id as deterministic tiebreakers.
pub fn compare_findings(a: &Finding, b: &Finding) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.location.file.cmp(&b.location.file))
        .then_with(|| a.location.line.cmp(&b.location.line))
        .then_with(|| a.location.column.cmp(&b.location.column))
        .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

pub fn order_findings(findings: &mut [Finding]) {
    findings.sort_by(compare_findings);
}
