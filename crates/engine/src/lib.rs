//! PyGuard Engine - Hybrid Security Analysis for Python
//!
//! Pairs a deterministic tree-sitter pass with an LLM review pass over the
//! same source, reconciles the two finding streams, scores the result, and
//! caches it under a content fingerprint.

pub mod cache;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod merge;
pub mod model;
pub mod risk;
pub mod static_analysis;

pub use cache::{CacheStats, ScanCache};
pub use config::{
    AnalysisKey, CacheConfig, EngineConfig, MergeConfig, ModelConfig, RulesConfig, ScoringConfig,
    SeverityWeights, EXAMPLE_CONFIG,
};
pub use crate::core::{
    Category, Finding, FindingSource, Location, MergeSides, ScanResult, ScanUnit, Severity,
    SynonymMap, UnitIdentity,
};
pub use engine::{ScanEngine, ScanEngineBuilder};
pub use error::{CacheCorruption, EngineError, ModelError, ParseError};
pub use fingerprint::{Fingerprint, Fingerprinter};
pub use history::{HistoryEntry, HistorySink, HistorySummary, MemoryHistory, NullSink};
pub use model::{
    CancelToken, MockModelProvider, ModelAnalysis, ModelAnalyzer, ModelFinding, ModelProvider,
    ModelReport, ModelRequest, ModelResponse, OpenAIProvider, TokenUsage,
};
pub use risk::{RiskScorer, MAX_RISK_SCORE};
pub use static_analysis::{RuleDef, StaticPass, RULES};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
