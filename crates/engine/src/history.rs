//! Scan history. Every completed scan, cache hits included, emits one
//! entry to the configured sink.

use crate::core::ScanResult;
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub scan_id: String,
    pub recorded_at: DateTime<Utc>,
    pub path: String,
    pub fingerprint: Fingerprint,
    pub risk_score: f64,
    pub finding_count: usize,
    pub degraded: bool,
    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<String>,

    pub cache_hit: bool,
}

impl HistoryEntry {
    pub fn from_result(
        sequence: u64,
        scan_id: String,
        result: &ScanResult,
        cache_hit: bool,
    ) -> Self {
        Self {
            sequence,
            scan_id,
            recorded_at: Utc::now(),
            path: result.unit.path.clone(),
            fingerprint: result.unit.fingerprint.clone(),
            risk_score: result.risk_score,
            finding_count: result.findings.len(),
            degraded: result.degraded,
            duration_ms: result.duration_ms,
            summary: result.analysis_summary.clone(),
            cache_hit,
        }
    }
}

pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

/// Discards everything. The default when callers do not care.
#[derive(Debug, Default)]
pub struct NullSink;

impl HistorySink for NullSink {
    fn record(&self, _entry: HistoryEntry) {}
}

/// Risk bands for the aggregate view.
const HIGH_RISK_FLOOR: f64 = 70.0;
const MEDIUM_RISK_FLOOR: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistorySummary {
    pub scans: usize,
    pub mean_risk: f64,
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,
}

/// Keeps the most recent entries in memory, oldest evicted first.
pub struct MemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn summary(&self) -> HistorySummary {
        let entries = self.entries.lock();
        if entries.is_empty() {
            return HistorySummary::default();
        }
        let mut summary = HistorySummary {
            scans: entries.len(),
            ..HistorySummary::default()
        };
        let mut total = 0.0;
        for entry in entries.iter() {
            total += entry.risk_score;
            if entry.risk_score >= HIGH_RISK_FLOOR {
                summary.high_risk += 1;
            } else if entry.risk_score >= MEDIUM_RISK_FLOOR {
                summary.medium_risk += 1;
            } else {
                summary.low_risk += 1;
            }
        }
        summary.mean_risk = total / entries.len() as f64;
        summary
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
