//! Aggregation configuration with sensible defaults.
//!
//! [`AggregateConfig`] controls which sources are queried, timeouts, per-source
//! quotas, cache refresh behaviour, and output caps. The defaults are tuned for
//! the public rate limits of each upstream API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TwinError;
use crate::types::SourceKind;

/// Configuration for the aggregation-and-scoring core.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Which sources to query. Queried concurrently.
    pub sources: Vec<SourceKind>,
    /// Overall deadline for one aggregation, in seconds. Source tasks still
    /// running at the deadline are abandoned and reported unavailable.
    pub aggregate_timeout_secs: u64,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Per-source quota overrides. Sources without an entry use
    /// [`RateQuota::default_for`].
    pub rate_limits: BTreeMap<SourceKind, RateQuota>,
    /// What to do with a stale cache entry.
    pub refresh_mode: RefreshMode,
    /// Output caps for the answer-generation context.
    pub context: ContextLimits,
    /// Maximum number of discovery results.
    pub discover_limit: usize,
    /// Base URLs of the upstream services.
    pub endpoints: SourceEndpoints,
    /// Optional token for the code-host API (raises its quota).
    pub github_token: Option<String>,
    /// Custom User-Agent. If `None`, scraped sources rotate through a
    /// built-in list and API sources use the crate identifier.
    pub user_agent: Option<String>,
    /// Delay between per-article detail requests to the dataset repository.
    pub figshare_request_delay_ms: u64,
    /// Transient-failure circuit breaker settings.
    pub breaker: BreakerSettings,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            sources: SourceKind::all().to_vec(),
            aggregate_timeout_secs: 25,
            request_timeout_secs: 15,
            rate_limits: BTreeMap::new(),
            refresh_mode: RefreshMode::Inline,
            context: ContextLimits::default(),
            discover_limit: 50,
            endpoints: SourceEndpoints::default(),
            github_token: None,
            user_agent: None,
            figshare_request_delay_ms: 50,
            breaker: BreakerSettings::default(),
        }
    }
}

impl AggregateConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `sources` must not be empty
    /// - `aggregate_timeout_secs` and `request_timeout_secs` must be greater than 0
    /// - every quota must allow at least one request per non-zero window
    /// - context and discovery caps must be greater than 0
    pub fn validate(&self) -> Result<(), TwinError> {
        if self.sources.is_empty() {
            return Err(TwinError::Config(
                "at least one source must be enabled".into(),
            ));
        }
        if self.aggregate_timeout_secs == 0 {
            return Err(TwinError::Config(
                "aggregate_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(TwinError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        for (kind, quota) in &self.rate_limits {
            if quota.max_requests == 0 || quota.window_secs == 0 {
                return Err(TwinError::Config(format!(
                    "rate limit for {kind} must allow max_requests > 0 per window_secs > 0"
                )));
            }
        }
        if self.context.max_per_category == 0 {
            return Err(TwinError::Config(
                "context.max_per_category must be greater than 0".into(),
            ));
        }
        if self.discover_limit == 0 {
            return Err(TwinError::Config(
                "discover_limit must be greater than 0".into(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(TwinError::Config(
                "breaker.failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Effective quota for a source.
    pub fn quota_for(&self, kind: SourceKind) -> RateQuota {
        self.rate_limits
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| RateQuota::default_for(kind))
    }
}

/// Outbound request quota for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuota {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Requests allowed to wait for a permit at once; beyond this they are
    /// rejected immediately.
    pub max_queue: usize,
    /// Longest a queued request waits before it is rejected.
    pub max_wait_ms: u64,
}

impl RateQuota {
    /// Default quota per source, based on each upstream's public limits.
    pub fn default_for(kind: SourceKind) -> Self {
        let (max_requests, window_secs) = match kind {
            SourceKind::SemanticScholar => (100, 300),
            SourceKind::GoogleScholar => (10, 60),
            SourceKind::GitHub => (60, 3_600),
            SourceKind::Figshare => (120, 60),
            SourceKind::Affiliations => (24, 1),
        };
        Self {
            max_requests,
            window_secs,
            max_queue: 8,
            max_wait_ms: 2_000,
        }
    }
}

/// Handling of stale cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Refresh synchronously; serve the stale entry only if the refresh fails.
    Inline,
    /// Serve the stale entry immediately and refresh in a background task.
    Background,
}

/// Per-category caps for the context payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    /// Highest-ranked items kept per category (publications, datasets,
    /// repositories).
    pub max_per_category: usize,
    /// Longest description excerpt carried per artifact, in characters.
    pub max_description_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_per_category: 10,
            max_description_chars: 200,
        }
    }
}

/// Base URLs of the upstream services, overridable for tests and mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEndpoints {
    pub semantic_scholar: String,
    pub google_scholar: String,
    pub github: String,
    pub figshare: String,
    pub orcid: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            semantic_scholar: "https://api.semanticscholar.org/graph/v1".into(),
            google_scholar: "https://scholar.google.com".into(),
            github: "https://api.github.com".into(),
            figshare: "https://api.figshare.com/v2".into(),
            orcid: "https://pub.orcid.org/v3.0".into(),
        }
    }
}

/// Circuit breaker thresholds for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive transient failures before a source's circuit opens.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}
