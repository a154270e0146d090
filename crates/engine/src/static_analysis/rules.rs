//! The deterministic rule table. Matching lives in the walker; this is
//! the data it consults.

use crate::core::{Category, Severity};

#[derive(Debug)]
pub struct RuleDef {
    pub id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub summary: &'static str,
}

pub static SHELL_CALL: RuleDef = RuleDef {
    id: "shell-call",
    category: Category::CommandInjection,
    severity: Severity::High,
    confidence: 0.9,
    summary: "Shell command built from dynamic input",
};

pub static SHELL_CALL_LITERAL: RuleDef = RuleDef {
    id: "shell-call-literal",
    category: Category::CommandInjection,
    severity: Severity::High,
    confidence: 0.6,
    summary: "Shell invocation with a literal command",
};

pub static CODE_EVAL: RuleDef = RuleDef {
    id: "code-eval",
    category: Category::CommandInjection,
    severity: Severity::High,
    confidence: 0.85,
    summary: "eval/exec of a dynamically built expression",
};

pub static SQL_EXEC: RuleDef = RuleDef {
    id: "sql-exec",
    category: Category::SqlInjection,
    severity: Severity::High,
    confidence: 0.85,
    summary: "SQL statement assembled from dynamic input",
};

pub static UNSAFE_PICKLE: RuleDef = RuleDef {
    id: "unsafe-pickle",
    category: Category::UnsafeDeserialization,
    severity: Severity::High,
    confidence: 0.9,
    summary: "pickle deserialization of untrusted data",
};

pub static UNSAFE_MARSHAL: RuleDef = RuleDef {
    id: "unsafe-marshal",
    category: Category::UnsafeDeserialization,
    severity: Severity::High,
    confidence: 0.85,
    summary: "marshal deserialization of untrusted data",
};

pub static UNSAFE_YAML: RuleDef = RuleDef {
    id: "unsafe-yaml",
    category: Category::UnsafeDeserialization,
    severity: Severity::High,
    confidence: 0.85,
    summary: "yaml.load without a safe loader",
};

pub static PATH_DYNAMIC: RuleDef = RuleDef {
    id: "path-dynamic",
    category: Category::PathTraversal,
    severity: Severity::Medium,
    confidence: 0.5,
    summary: "File path built from dynamic input",
};

pub static PATH_DOTDOT: RuleDef = RuleDef {
    id: "path-dotdot",
    category: Category::PathTraversal,
    severity: Severity::Medium,
    confidence: 0.7,
    summary: "Parent-directory reference in a path literal",
};

pub static WEAK_HASH: RuleDef = RuleDef {
    id: "weak-hash",
    category: Category::CryptoWeakness,
    severity: Severity::Medium,
    confidence: 0.9,
    summary: "Broken hash algorithm (MD5/SHA-1)",
};

pub static HARDCODED_SECRET: RuleDef = RuleDef {
    id: "hardcoded-secret",
    category: Category::CryptoWeakness,
    severity: Severity::Medium,
    confidence: 0.6,
    summary: "Secret material embedded in source",
};

pub static SECRET_LOGGING: RuleDef = RuleDef {
    id: "secret-logging",
    category: Category::InfoDisclosure,
    severity: Severity::Medium,
    confidence: 0.7,
    summary: "Secret-bearing value written to output or logs",
};

pub static BUSY_LOOP: RuleDef = RuleDef {
    id: "busy-loop",
    category: Category::ResourceExhaustion,
    severity: Severity::Medium,
    confidence: 0.6,
    summary: "Unbounded loop with no exit condition",
};

pub static PLAINTEXT_URL: RuleDef = RuleDef {
    id: "plaintext-url",
    category: Category::InsecureNetwork,
    severity: Severity::Low,
    confidence: 0.8,
    summary: "Cleartext http:// endpoint",
};

pub static TLS_VERIFY_OFF: RuleDef = RuleDef {
    id: "tls-verify-off",
    category: Category::InsecureNetwork,
    severity: Severity::High,
    confidence: 0.85,
    summary: "TLS certificate verification disabled",
};

pub static INPUT_TO_SINK: RuleDef = RuleDef {
    id: "input-to-sink",
    category: Category::InputValidation,
    severity: Severity::High,
    confidence: 0.8,
    summary: "Raw stdin flows into a dangerous call",
};

pub static RULES: &[&RuleDef] = &[
    &SHELL_CALL,
    &SHELL_CALL_LITERAL,
    &CODE_EVAL,
    &SQL_EXEC,
    &UNSAFE_PICKLE,
    &UNSAFE_MARSHAL,
    &UNSAFE_YAML,
    &PATH_DYNAMIC,
    &PATH_DOTDOT,
    &WEAK_HASH,
    &HARDCODED_SECRET,
    &SECRET_LOGGING,
    &BUSY_LOOP,
    &PLAINTEXT_URL,
    &TLS_VERIFY_OFF,
    &INPUT_TO_SINK,
];
