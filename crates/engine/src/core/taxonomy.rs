//! The fixed vulnerability taxonomy and the mapping of free-text category
//! names onto it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A vulnerability category. The nine taxonomy entries are what both
/// analyzers report against; `Unparseable` and `ModelResponseError` are
/// synthetic diagnostics; `Other` carries a model-reported category that
/// could not be mapped onto the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    CommandInjection,
    PathTraversal,
    SqlInjection,
    UnsafeDeserialization,
    CryptoWeakness,
    InfoDisclosure,
    ResourceExhaustion,
    InsecureNetwork,
    InputValidation,
    Unparseable,
    ModelResponseError,
    Other(String),
}

impl Category {
    pub const TAXONOMY: [Category; 9] = [
        Category::CommandInjection,
        Category::PathTraversal,
        Category::SqlInjection,
        Category::UnsafeDeserialization,
        Category::CryptoWeakness,
        Category::InfoDisclosure,
        Category::ResourceExhaustion,
        Category::InsecureNetwork,
        Category::InputValidation,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::CommandInjection => "command-injection",
            Self::PathTraversal => "path-traversal",
            Self::SqlInjection => "sql-injection",
            Self::UnsafeDeserialization => "unsafe-deserialization",
            Self::CryptoWeakness => "crypto-weakness",
            Self::InfoDisclosure => "info-disclosure",
            Self::ResourceExhaustion => "resource-exhaustion",
            Self::InsecureNetwork => "insecure-network",
            Self::InputValidation => "input-validation",
            Self::Unparseable => "unparseable",
            Self::ModelResponseError => "model-response-error",
            Self::Other(name) => name,
        }
    }

    /// Parses a canonical category name. Synonym resolution is the
    /// normalizer's job, via [`SynonymMap`].
    pub fn parse_canonical(name: &str) -> Option<Category> {
        let normalized = normalize(name);
        match normalized.as_str() {
            "command-injection" => Some(Self::CommandInjection),
            "path-traversal" => Some(Self::PathTraversal),
            "sql-injection" => Some(Self::SqlInjection),
            "unsafe-deserialization" => Some(Self::UnsafeDeserialization),
            "crypto-weakness" => Some(Self::CryptoWeakness),
            "info-disclosure" => Some(Self::InfoDisclosure),
            "resource-exhaustion" => Some(Self::ResourceExhaustion),
            "insecure-network" => Some(Self::InsecureNetwork),
            "input-validation" => Some(Self::InputValidation),
            "unparseable" => Some(Self::Unparseable),
            "model-response-error" => Some(Self::ModelResponseError),
            _ => None,
        }
    }

    /// True for categories with a clear syntactic signature, where the
    /// static analyzer's certainty outranks the model's during a merge.
    pub fn pattern_based(&self) -> bool {
        matches!(
            self,
            Self::CommandInjection
                | Self::SqlInjection
                | Self::UnsafeDeserialization
                | Self::CryptoWeakness
                | Self::InsecureNetwork
        )
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Unparseable | Self::ModelResponseError)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::parse_canonical(&value).unwrap_or(Category::Other(value))
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

/// Lowercase, trim, and collapse separators so "SQL Injection",
/// "sql_injection" and "sql-injection" all compare equal.
fn normalize(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Maps free-text model categories onto the taxonomy. Defaults cover the
/// vocabulary the model endpoints actually emit; config may extend them.
#[derive(Debug, Clone)]
pub struct SynonymMap {
    entries: HashMap<String, Category>,
}

impl SynonymMap {
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        let table: [(&str, Category); 34] = [
            ("shell-injection", Category::CommandInjection),
            ("os-command-injection", Category::CommandInjection),
            ("command-execution", Category::CommandInjection),
            ("code-injection", Category::CommandInjection),
            ("eval-injection", Category::CommandInjection),
            ("remote-code-execution", Category::CommandInjection),
            ("rce", Category::CommandInjection),
            ("arbitrary-code-execution", Category::CommandInjection),
            ("sqli", Category::SqlInjection),
            ("directory-traversal", Category::PathTraversal),
            ("path-manipulation", Category::PathTraversal),
            ("file-traversal", Category::PathTraversal),
            ("local-file-inclusion", Category::PathTraversal),
            ("lfi", Category::PathTraversal),
            ("insecure-deserialization", Category::UnsafeDeserialization),
            ("deserialization", Category::UnsafeDeserialization),
            ("pickle-injection", Category::UnsafeDeserialization),
            ("weak-crypto", Category::CryptoWeakness),
            ("weak-cryptography", Category::CryptoWeakness),
            ("insecure-crypto", Category::CryptoWeakness),
            ("weak-hash", Category::CryptoWeakness),
            ("weak-hashing", Category::CryptoWeakness),
            ("hardcoded-secret", Category::CryptoWeakness),
            ("hardcoded-credentials", Category::CryptoWeakness),
            ("information-disclosure", Category::InfoDisclosure),
            ("information-leak", Category::InfoDisclosure),
            ("sensitive-data-exposure", Category::InfoDisclosure),
            ("data-leak", Category::InfoDisclosure),
            ("denial-of-service", Category::ResourceExhaustion),
            ("dos", Category::ResourceExhaustion),
            ("infinite-loop", Category::ResourceExhaustion),
            ("insecure-transport", Category::InsecureNetwork),
            ("cleartext-transmission", Category::InsecureNetwork),
            ("unvalidated-input", Category::InputValidation),
        ];
        for (name, category) in table {
            entries.insert(name.to_string(), category);
        }
        Self { entries }
    }

    /// Layers config-supplied overrides on top of the defaults.
    pub fn extend(&mut self, overrides: &HashMap<String, Category>) {
        for (raw, category) in overrides {
            self.entries.insert(normalize(raw), category.clone());
        }
    }

    /// Resolves a raw category name: canonical names win, then synonyms.
    /// `None` means the name stays verbatim (low confidence).
    pub fn resolve(&self, raw: &str) -> Option<Category> {
        let normalized = normalize(raw);
        if let Some(canonical) = Category::parse_canonical(&normalized) {
            return Some(canonical);
        }
        self.entries.get(&normalized).cloned()
    }
}

impl Default for SynonymMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for category in Category::TAXONOMY {
            let name = category.as_str().to_string();
            assert_eq!(Category::parse_canonical(&name), Some(category));
        }
    }

    #[test]
    fn serde_preserves_unknown_categories() {
        let json = "\"prototype-pollution\"";
        let category: Category = serde_json::from_str(json).unwrap();
        assert_eq!(category, Category::Other("prototype-pollution".to_string()));
        assert_eq!(serde_json::to_string(&category).unwrap(), json);
    }

    #[test]
    fn synonyms_map_model_vocabulary() {
        let map = SynonymMap::with_defaults();
        assert_eq!(map.resolve("Shell Injection"), Some(Category::CommandInjection));
        assert_eq!(map.resolve("SQLi"), Some(Category::SqlInjection));
        assert_eq!(map.resolve("weak_hash"), Some(Category::CryptoWeakness));
        assert_eq!(map.resolve("xss"), None);
    }

    #[test]
    fn overrides_extend_defaults() {
        let mut map = SynonymMap::with_defaults();
        let mut overrides = HashMap::new();
        overrides.insert("Template Injection".to_string(), Category::CommandInjection);
        map.extend(&overrides);
        assert_eq!(map.resolve("template injection"), Some(Category::CommandInjection));
        assert_eq!(map.resolve("sqli"), Some(Category::SqlInjection));
    }
}
