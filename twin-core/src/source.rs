//! Trait definition for pluggable source backends.
//!
//! Each external source (publication indices, code host, dataset repository,
//! affiliation directory) implements [`SourceClient`] to provide a uniform
//! fetch interface that returns already-normalised [`SourceData`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::types::{SourceData, SourceKind};

/// A pluggable source backend.
///
/// Implementors perform one fetch type against one upstream and convert
/// its native payload into [`SourceData`]. Each source handles its own:
///
/// - URL construction and identifier encoding
/// - HTTP request with appropriate headers
/// - JSON or HTML parsing
/// - Classifying failures as [`SourceError::Transient`] or
///   [`SourceError::Permanent`]
///
/// Implementations are shared across concurrent aggregation tasks and must
/// be `Send + Sync`.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which source this client represents.
    fn kind(&self) -> SourceKind;

    /// Fetch everything this source knows about the researcher identified
    /// by `identifier` (author id, username, search name, or ORCID iD).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transient`] for timeouts, throttling and
    /// server errors, [`SourceError::Permanent`] for unknown identifiers and
    /// malformed responses.
    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError>;
}

/// Classify an HTTP status into a source failure.
///
/// 429 and 5xx are transient; every other non-success status is permanent.
pub fn classify_status(status: reqwest::StatusCode, context: &str) -> SourceError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SourceError::Transient(format!("{context}: HTTP {status}"))
    } else {
        SourceError::Permanent(format!("{context}: HTTP {status}"))
    }
}

/// Classify a transport-level `reqwest` error.
///
/// Timeouts and connection failures are transient; body decoding failures
/// mean the upstream returned something unexpected and are permanent.
pub fn classify_transport(err: &reqwest::Error, context: &str) -> SourceError {
    if err.is_decode() {
        SourceError::Permanent(format!("{context}: malformed response: {err}"))
    } else if let Some(status) = err.status() {
        classify_status(status, context)
    } else {
        SourceError::Transient(format!("{context}: {err}"))
    }
}

/// Send a request and decode a successful JSON response.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    context: &str,
) -> Result<T, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(&e, context))?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(status, context));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| classify_transport(&e, context))
}

/// Send a request and return a successful response body as text.
pub(crate) async fn send_text(
    request: reqwest::RequestBuilder,
    context: &str,
) -> Result<String, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(&e, context))?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(status, context));
    }
    response
        .text()
        .await
        .map_err(|e| classify_transport(&e, context))
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
