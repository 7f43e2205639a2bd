//! Error types for the twin-core crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No tokens or credentials appear in
//! error messages.

use crate::types::SourceKind;

/// Failure reported by a single source client.
///
/// The split drives orchestrator behaviour: transient failures are masked
/// by stale cache entries and retried on the next refresh cycle; permanent
/// failures mark the source unavailable for that researcher until its
/// identifier changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network timeout, upstream throttling, or a 5xx response.
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Unknown identifier, not found, or a malformed response.
    #[error("permanent source failure: {0}")]
    Permanent(String),
}

impl SourceError {
    /// Whether this failure may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// The per-source rate limiter rejected a request: the bounded wait queue
/// was full or the wait exceeded its bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limited: {source_kind} ({reason})")]
pub struct RateLimited {
    /// Which source's quota was exhausted.
    pub source_kind: SourceKind,
    /// Why the request was rejected.
    pub reason: String,
}

/// Errors raised by a [`crate::cache::CacheStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend storage failure (database, lock).
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Payload could not be (de)serialised.
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors that escape the core to its callers.
///
/// Source failures never appear here; they are folded into per-source
/// status on the profile.
#[derive(Debug, thiserror::Error)]
pub enum TwinError {
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The researcher key is not known.
    #[error("unknown researcher: {0}")]
    UnknownResearcher(String),

    /// A discovery query or other input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Convenience type alias for twin-core results.
pub type Result<T> = std::result::Result<T, TwinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_transient() {
        let err = SourceError::Transient("HTTP 429".into());
        assert_eq!(err.to_string(), "transient source failure: HTTP 429");
        assert!(err.is_transient());
    }

    #[test]
    fn display_permanent() {
        let err = SourceError::Permanent("author not found".into());
        assert_eq!(err.to_string(), "permanent source failure: author not found");
        assert!(!err.is_transient());
    }

    #[test]
    fn display_rate_limited() {
        let err = RateLimited {
            source_kind: SourceKind::GitHub,
            reason: "queue full".into(),
        };
        assert_eq!(err.to_string(), "rate limited: github (queue full)");
    }

    #[test]
    fn display_config() {
        let err = TwinError::Config("aggregate_timeout_secs must be > 0".into());
        assert_eq!(
            err.to_string(),
            "config error: aggregate_timeout_secs must be > 0"
        );
    }

    #[test]
    fn display_unknown_researcher() {
        let err = TwinError::UnknownResearcher("jane-doe".into());
        assert_eq!(err.to_string(), "unknown researcher: jane-doe");
    }

    #[test]
    fn cache_error_from_serde() {
        let parse_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = parse_err.into();
        assert!(err.to_string().starts_with("cache payload error"));
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TwinError>();
        assert_send_sync::<SourceError>();
        assert_send_sync::<CacheError>();
    }
}
