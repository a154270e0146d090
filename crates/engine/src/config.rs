use crate::core::{Category, Severity, SynonymMap};
use crate::error::EngineError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Everything the engine consumes as configuration. Loading is the
/// caller's concern; the engine only validates values at construction and
/// refuses to run with nonsense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default = "default_max_concurrent_scans")]
    pub max_concurrent_scans: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Falls back to the OPENAI_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Any OpenAI-compatible endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Input sizes above this estimate are chunked at top-level
    /// definition boundaries.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Used when the model does not state its own certainty.
    #[serde(default = "default_model_confidence")]
    pub default_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// A TTL of zero forces a miss on every lookup.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// When set, the cache is loaded from this snapshot at construction
    /// and written back by `ScanEngine::flush`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    /// Canonical category names to switch off.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Extra free-text -> canonical category mappings, layered over the
    /// built-in synonym table.
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
}

impl RulesConfig {
    pub fn category_enabled(&self, category: &Category) -> bool {
        !self.disabled.iter().any(|name| name == category.as_str())
    }

    pub fn enabled_categories(&self) -> Vec<Category> {
        Category::TAXONOMY
            .into_iter()
            .filter(|c| self.category_enabled(c))
            .collect()
    }

    pub fn synonym_map(&self) -> SynonymMap {
        let mut map = SynonymMap::with_defaults();
        let overrides: HashMap<String, Category> = self
            .synonyms
            .iter()
            .filter_map(|(raw, target)| {
                Category::parse_canonical(target).map(|c| (raw.clone(), c))
            })
            .collect();
        map.extend(&overrides);
        map
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub severity_weights: SeverityWeights,

    /// Weight multiplier for repeated findings of one category.
    #[serde(default = "default_repeat_factor")]
    pub repeat_factor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 3.0,
            high: 7.0,
            critical: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Findings of one category within this many lines of each other are
    /// the same issue.
    #[serde(default = "default_line_tolerance")]
    pub line_tolerance: usize,
}

/// The analysis-relevant slice of the configuration, serialized
/// canonically into the fingerprint so config changes invalidate cached
/// results.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisKey {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_enabled: bool,
    pub rules: Vec<String>,
}

impl EngineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config-file key wins, environment is the fallback.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.model
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn analysis_key(&self, model_enabled: bool) -> AnalysisKey {
        let mut rules: Vec<String> = self
            .rules
            .enabled_categories()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        rules.sort();
        AnalysisKey {
            model: self.model.model.clone(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            model_enabled,
            rules,
        }
    }

    /// Fatal validation. A scan must never proceed with unknown
    /// configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::Configuration(msg));

        if self.model.model.trim().is_empty() {
            return fail("model identifier must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return fail(format!(
                "temperature {} outside [0.0, 2.0]",
                self.model.temperature
            ));
        }
        if self.model.max_tokens == 0 {
            return fail("max_tokens must be positive".to_string());
        }
        if self.model.token_budget == 0 {
            return fail("token_budget must be positive".to_string());
        }
        if self.model.timeout_seconds == 0 {
            return fail("timeout_seconds must be positive".to_string());
        }
        if self.model.retry_attempts == 0 {
            return fail("retry_attempts must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.model.default_confidence) {
            return fail(format!(
                "default_confidence {} outside [0.0, 1.0]",
                self.model.default_confidence
            ));
        }
        if self.cache.capacity == 0 {
            return fail("cache capacity must be at least 1".to_string());
        }
        if self.max_concurrent_scans == 0 {
            return fail("max_concurrent_scans must be at least 1".to_string());
        }

        let w = &self.scoring.severity_weights;
        for (name, value) in [
            ("low", w.low),
            ("medium", w.medium),
            ("high", w.high),
            ("critical", w.critical),
        ] {
            if !value.is_finite() || value < 0.0 {
                return fail(format!("severity weight '{name}' must be a non-negative number"));
            }
        }
        if w.low + w.medium + w.high + w.critical == 0.0 {
            return fail("severity weights must not all be zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.scoring.repeat_factor) {
            return fail(format!(
                "repeat_factor {} outside [0.0, 1.0]",
                self.scoring.repeat_factor
            ));
        }

        for name in &self.rules.disabled {
            match Category::parse_canonical(name) {
                Some(c) if Category::TAXONOMY.contains(&c) => {}
                _ => return fail(format!("unknown category '{name}' in rules.disabled")),
            }
        }
        for target in self.rules.synonyms.values() {
            if Category::parse_canonical(target)
                .filter(|c| Category::TAXONOMY.contains(c))
                .is_none()
            {
                return fail(format!("synonym target '{target}' is not a taxonomy category"));
            }
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            rules: RulesConfig::default(),
            scoring: ScoringConfig::default(),
            merge: MergeConfig::default(),
            max_concurrent_scans: default_max_concurrent_scans(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            token_budget: default_token_budget(),
            timeout_seconds: default_timeout_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            default_confidence: default_model_confidence(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: default_ttl_hours(),
            capacity: default_cache_capacity(),
            snapshot_path: None,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity_weights: SeverityWeights::default(),
            repeat_factor: default_repeat_factor(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            line_tolerance: default_line_tolerance(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_token_budget() -> usize {
    6000
}
fn default_timeout_seconds() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_model_confidence() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_ttl_hours() -> u64 {
    24
}
fn default_cache_capacity() -> usize {
    256
}
fn default_repeat_factor() -> f64 {
    0.5
}
fn default_line_tolerance() -> usize {
    2
}
fn default_max_concurrent_scans() -> usize {
    4
}

pub const EXAMPLE_CONFIG: &str = r#"
# pyguard configuration

model:
  model: gpt-4o-mini
  # api_key: sk-...        # defaults to OPENAI_API_KEY
  # base_url: http://localhost:8080/v1
  temperature: 0.2
  max_tokens: 4000
  timeout_seconds: 60
  retry_attempts: 3

cache:
  enabled: true
  ttl_hours: 24
  capacity: 256
  # snapshot_path: .pyguard-cache.json

rules:
  disabled: []
  synonyms: {}

scoring:
  severity_weights:
    low: 1.0
    medium: 3.0
    high: 7.0
    critical: 12.0
  repeat_factor: 0.5

merge:
  line_tolerance: 2

max_concurrent_scans: 4
"#;
