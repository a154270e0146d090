use crate::core::{order_findings, Finding, Severity};
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One unit of work: a path label plus the source text to audit. The
/// engine never touches the filesystem; callers read files and hand the
/// text in.
#[derive(Debug, Clone)]
pub struct ScanUnit {
    pub path: String,
    pub source: String,
}

impl ScanUnit {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Ok(Self {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitIdentity {
    pub path: String,
    pub fingerprint: Fingerprint,
}

/// The finished product of one scan. Immutable after construction; cache
/// hits return it unchanged, original timestamp included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub unit: UnitIdentity,
    pub findings: Vec<Finding>,
    pub risk_score: f64,
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analysis_summary: Option<String>,

    pub duration_ms: u64,
}

impl ScanResult {
    pub fn new(
        unit: UnitIdentity,
        mut findings: Vec<Finding>,
        risk_score: f64,
        degraded: bool,
        analysis_summary: Option<String>,
        duration_ms: u64,
    ) -> Self {
        order_findings(&mut findings);
        Self {
            unit,
            findings,
            risk_score,
            degraded,
            timestamp: Utc::now(),
            analysis_summary,
            duration_ms,
        }
    }

    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        Severity::all()
            .into_iter()
            .rev()
            .map(|severity| {
                let count = self.findings.iter().filter(|f| f.severity == severity).count();
                (severity, count)
            })
            .collect()
    }

    pub fn has_findings_at_or_above(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= threshold)
    }
}
