//! Source client implementations.
//!
//! Each module provides a struct implementing [`crate::source::SourceClient`]
//! for one upstream service and normalising its payload into
//! [`crate::types::SourceData`].

pub mod affiliations;
pub mod figshare;
pub mod github;
pub mod google_scholar;
pub mod semantic_scholar;

use std::sync::Arc;

pub use affiliations::AffiliationSource;
pub use figshare::FigshareSource;
pub use github::GitHubSource;
pub use google_scholar::GoogleScholarSource;
pub use semantic_scholar::SemanticScholarSource;

use crate::config::AggregateConfig;
use crate::error::TwinError;
use crate::source::SourceClient;
use crate::types::SourceKind;

/// Build the live client for one source kind.
///
/// # Errors
///
/// Returns [`TwinError::Http`] if the HTTP client cannot be built.
pub fn client_for(
    kind: SourceKind,
    config: &AggregateConfig,
) -> Result<Arc<dyn SourceClient>, TwinError> {
    let client: Arc<dyn SourceClient> = match kind {
        SourceKind::SemanticScholar => Arc::new(SemanticScholarSource::from_config(config)?),
        SourceKind::GoogleScholar => Arc::new(GoogleScholarSource::from_config(config)?),
        SourceKind::GitHub => Arc::new(GitHubSource::from_config(config)?),
        SourceKind::Figshare => Arc::new(FigshareSource::from_config(config)?),
        SourceKind::Affiliations => Arc::new(AffiliationSource::from_config(config)?),
    };
    Ok(client)
}

/// Live clients for every source enabled in `config`, in configuration order.
///
/// # Errors
///
/// Returns [`TwinError::Http`] if any HTTP client cannot be built.
pub fn default_clients(config: &AggregateConfig) -> Result<Vec<Arc<dyn SourceClient>>, TwinError> {
    let mut seen = Vec::new();
    let mut clients = Vec::new();
    for &kind in &config.sources {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        clients.push(client_for(kind, config)?);
    }
    Ok(clients)
}
