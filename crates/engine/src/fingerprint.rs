//! Content identity for (source, config) pairs. The fingerprint is the
//! cache key and the in-flight coordination key, so it must change when
//! either the source bytes or the analysis-relevant configuration change.

use crate::config::AnalysisKey;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First twelve hex digits, for logs and rendering.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Fingerprinter {
    key_bytes: Vec<u8>,
}

impl Fingerprinter {
    pub fn new(key: &AnalysisKey) -> Result<Self, EngineError> {
        let key_bytes = serde_json::to_vec(key)
            .map_err(|e| EngineError::Configuration(format!("unserializable analysis key: {e}")))?;
        Ok(Self { key_bytes })
    }

    pub fn fingerprint(&self, source: &str) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(&self.key_bytes);
        Fingerprint(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn fingerprinter(config: &EngineConfig) -> Fingerprinter {
        Fingerprinter::new(&config.analysis_key(true)).unwrap()
    }

    #[test]
    fn identical_inputs_identical_identity() {
        let config = EngineConfig::default();
        let fp = fingerprinter(&config);
        assert_eq!(fp.fingerprint("import os\n"), fp.fingerprint("import os\n"));
    }

    #[test]
    fn byte_change_changes_identity() {
        let config = EngineConfig::default();
        let fp = fingerprinter(&config);
        assert_ne!(fp.fingerprint("import os\n"), fp.fingerprint("import os "));
    }

    #[test]
    fn config_change_changes_identity() {
        let base = EngineConfig::default();
        let mut warmer = EngineConfig::default();
        warmer.model.temperature = 0.9;
        let a = fingerprinter(&base).fingerprint("x = 1\n");
        let b = fingerprinter(&warmer).fingerprint("x = 1\n");
        assert_ne!(a, b);
    }

    #[test]
    fn disabling_a_rule_changes_identity() {
        let base = EngineConfig::default();
        let mut reduced = EngineConfig::default();
        reduced.rules.disabled.push("sql-injection".to_string());
        let a = fingerprinter(&base).fingerprint("x = 1\n");
        let b = fingerprinter(&reduced).fingerprint("x = 1\n");
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let config = EngineConfig::default();
        let fp = fingerprinter(&config).fingerprint("");
        assert_eq!(fp.as_hex().len(), 64);
        assert!(fp.as_hex().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 12);
    }
}
