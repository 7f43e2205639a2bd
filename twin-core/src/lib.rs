//! # twin-core
//!
//! Aggregation and scoring core for ResearchTwin.
//!
//! Collects a researcher's publications, code repositories, datasets and
//! affiliations from several public sources, merges overlapping records,
//! and computes the per-artifact QIC score and the researcher-level S-Index.
//!
//! ## Design
//!
//! - One [`SourceClient`] per upstream service, normalising into [`Artifact`]
//! - Per-source outbound quotas with a bounded wait queue
//! - Cache lookups are three-state (fresh, stale, miss); stale entries are
//!   served when a refresh fails
//! - Sources are fetched concurrently under one deadline; a failing or slow
//!   source never fails the aggregation
//! - Deduplication and scoring are pure and order-independent
//!
//! ## Security
//!
//! - Tokens never appear in error messages or logs
//! - Researcher identifiers are logged at debug level only

pub mod cache;
pub mod config;
pub mod context;
pub mod discover;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod profile;
pub mod rate_limit;
pub mod snapshot;
pub mod source;
pub mod source_health;
pub mod sources;
pub mod types;

pub use cache::{CacheEntry, CacheKey, CacheLookup, CacheStore, MemoryCacheStore};
pub use config::{AggregateConfig, ContextLimits, RateQuota, RefreshMode};
pub use context::{artifact_items, build_context, ContextItem, ContextPayload};
pub use discover::{discover, validate_query, DiscoverFilter, DiscoverHit};
pub use error::{CacheError, RateLimited, Result, SourceError, TwinError};
pub use orchestrator::scoring::ScoreBreakdown;
pub use orchestrator::{Orchestrator, ResearcherRawData};
pub use profile::{build_profile, ResearcherProfile};
pub use snapshot::ProfileSnapshots;
pub use source::SourceClient;
pub use types::{
    Affiliation, Artifact, ArtifactKind, PublicationStats, ResearcherRecord, Reuse, SourceData,
    SourceKind, SourceReport, SourceStatus,
};

/// Aggregate every configured source for `researcher` and build the
/// canonical profile.
///
/// Never fails: unreachable sources are reported on the profile's
/// per-source status.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> twin_core::Result<()> {
/// use std::sync::Arc;
/// use twin_core::{AggregateConfig, MemoryCacheStore, Orchestrator, ResearcherRecord, SourceKind};
///
/// let config = AggregateConfig::default();
/// let orchestrator = Orchestrator::from_config(&config, Arc::new(MemoryCacheStore::default()))?;
/// let jane = ResearcherRecord::new("jane-doe", "Jane Doe")
///     .with_identifier(SourceKind::GitHub, "janedoe");
/// let profile = twin_core::aggregate_profile(&orchestrator, &jane).await;
/// println!("S-Index: {:.1}", profile.s_index);
/// # Ok(())
/// # }
/// ```
pub async fn aggregate_profile(
    orchestrator: &Orchestrator,
    researcher: &ResearcherRecord,
) -> ResearcherProfile {
    let raw = orchestrator.aggregate(researcher).await;
    build_profile(researcher, &raw)
}
