//! Error taxonomy. Only configuration problems are fatal; everything else
//! degrades the affected scan locally and is logged, never surfaced as a
//! scan failure.

use thiserror::Error;

/// Errors the engine's public surface can return. `Configuration` is
/// raised at construction and means no scan ever ran; `Internal` covers
/// runtime plumbing failures that should not occur in practice.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal engine failure: {0}")]
    Internal(String),
}

/// Model transport and response failures. Transient variants are retried
/// by the bounded-retry machine; `UnusableResponse` is not a transport
/// problem and is handled by response salvage instead.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("rate limited by model endpoint")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("endpoint error: {0}")]
    Endpoint(String),

    #[error("unusable response: {0}")]
    UnusableResponse(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::UnusableResponse(_))
    }
}

/// Malformed source. Degrades the static pass to a single synthetic
/// finding; the scan continues.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("parser rejected source")]
    Rejected,

    #[error("grammar unavailable: {0}")]
    Grammar(String),
}

/// An unreadable cache entry or snapshot. Treated as a miss; the bad data
/// is discarded.
#[derive(Debug, Error)]
#[error("cache corruption: {0}")]
pub struct CacheCorruption(pub String);
