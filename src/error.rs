//! Error types for the researchtwin service.

use twin_core::TwinError;

/// Top-level error type for the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Registry or cache database error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error raised by the aggregation core.
    #[error(transparent)]
    Core(TwinError),

    /// No active researcher with this slug.
    #[error("unknown researcher: {0}")]
    UnknownResearcher(String),

    /// Request failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No answer-generation service is configured.
    #[error("answer generation unavailable: {0}")]
    AnswerUnavailable(String),

    /// The answer-generation service failed or timed out.
    #[error("answer generation error: {0}")]
    Answer(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TwinError> for ServiceError {
    fn from(e: TwinError) -> Self {
        match e {
            TwinError::InvalidInput(msg) => Self::InvalidInput(msg),
            TwinError::UnknownResearcher(key) => Self::UnknownResearcher(key),
            other => Self::Core(other),
        }
    }
}

/// Errors from the SQLite registry and cache store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServiceError>;
