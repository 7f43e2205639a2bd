//! Concurrent per-source fetch with cache, quota, and deadline.
//!
//! One task per configured source. Each task independently checks the
//! permanent-failure ledger and the cache, and only goes to the network on a
//! stale entry or a miss, after acquiring a rate-limit permit. All tasks are
//! joined against a single deadline; a task still running at the deadline is
//! detached rather than cancelled, so its cache write still lands.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{now_epoch_secs, CacheKey, CacheLookup, CacheStore};
use crate::config::{AggregateConfig, RefreshMode};
use crate::error::{SourceError, TwinError};
use crate::rate_limit::RateLimiter;
use crate::source::SourceClient;
use crate::source_health::SourceHealth;
use crate::sources::default_clients;
use crate::types::{ResearcherRecord, SourceData, SourceKind, SourceReport, SourceStatus};

/// Everything fetched for one researcher in one aggregation call.
///
/// Each source's payload is all-or-nothing: a source either contributes its
/// complete [`SourceData`] or nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearcherRawData {
    pub researcher: String,
    pub data: BTreeMap<SourceKind, SourceData>,
    pub reports: BTreeMap<SourceKind, SourceReport>,
}

impl ResearcherRawData {
    pub fn source(&self, kind: SourceKind) -> Option<&SourceData> {
        self.data.get(&kind)
    }

    pub fn status(&self, kind: SourceKind) -> Option<SourceStatus> {
        self.reports.get(&kind).map(|r| r.status)
    }

    fn record(&mut self, kind: SourceKind, data: Option<SourceData>, report: SourceReport) {
        if let Some(data) = data {
            self.data.insert(kind, data);
        }
        self.reports.insert(kind, report);
    }
}

/// Shared state a single source task needs; cheap to clone.
#[derive(Clone)]
struct SourceTask {
    client: Arc<dyn SourceClient>,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<RateLimiter>,
    health: Arc<SourceHealth>,
    researcher: String,
    identifier: String,
    refresh_mode: RefreshMode,
}

type TaskOutcome = (Option<SourceData>, SourceReport);

impl SourceTask {
    fn kind(&self) -> SourceKind {
        self.client.kind()
    }

    fn key(&self) -> CacheKey {
        CacheKey::profile(self.kind(), self.researcher.clone(), &self.identifier)
    }

    async fn run(self) -> TaskOutcome {
        let kind = self.kind();
        if let Some(reason) =
            self.health
                .permanent_failure(kind, &self.researcher, &self.identifier)
        {
            return (None, SourceReport::unavailable(reason));
        }

        let lookup = match self.cache.get(&self.key()).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(source = %kind, error = %e, "cache read failed");
                CacheLookup::Miss
            }
        };

        match lookup {
            CacheLookup::Fresh(entry) => {
                tracing::debug!(source = %kind, researcher = %self.researcher, "cache hit");
                (Some(entry.payload), SourceReport::connected(entry.fetched_at))
            }
            CacheLookup::Stale(entry) if self.refresh_mode == RefreshMode::Background => {
                tracing::debug!(source = %kind, researcher = %self.researcher, "serving stale entry, refreshing in background");
                let refresher = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = refresher.refresh().await {
                        tracing::warn!(source = %refresher.kind(), error = %e, "background refresh failed");
                    }
                });
                let report = SourceReport {
                    status: SourceStatus::Connected,
                    stale: true,
                    fetched_at: Some(entry.fetched_at),
                    detail: Some("refresh in progress".into()),
                };
                (Some(entry.payload), report)
            }
            other => {
                let stale = other.into_entry();
                match self.refresh().await {
                    Ok((data, fetched_at)) => (Some(data), SourceReport::connected(fetched_at)),
                    Err(e) if e.is_transient() => match stale {
                        Some(entry) => {
                            tracing::warn!(source = %kind, error = %e, "refresh failed, serving stale entry");
                            (
                                Some(entry.payload),
                                SourceReport::degraded(entry.fetched_at, e.to_string()),
                            )
                        }
                        None => {
                            tracing::warn!(source = %kind, error = %e, "fetch failed, no cached entry");
                            (None, SourceReport::unavailable(e.to_string()))
                        }
                    },
                    Err(e) => {
                        tracing::warn!(source = %kind, error = %e, "source failed permanently");
                        (None, SourceReport::unavailable(e.to_string()))
                    }
                }
            }
        }
    }

    /// Fetch from the network and overwrite the cache entry on success.
    ///
    /// Open circuits and rate-limit rejections surface as transient errors.
    async fn refresh(&self) -> Result<(SourceData, i64), SourceError> {
        let kind = self.kind();
        if !self.health.should_attempt(kind) {
            return Err(SourceError::Transient(format!("{kind} circuit open")));
        }
        self.limiter
            .acquire(kind)
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        match self.client.fetch(&self.identifier).await {
            Ok(data) => {
                self.health.record_success(kind);
                let fetched_at = now_epoch_secs();
                if let Err(e) = self
                    .cache
                    .put(self.key(), data.clone(), kind.ttl_class())
                    .await
                {
                    tracing::warn!(source = %kind, error = %e, "cache write failed");
                }
                Ok((data, fetched_at))
            }
            Err(e) if e.is_transient() => {
                self.health.record_transient(kind);
                Err(e)
            }
            Err(e) => {
                self.health
                    .record_permanent(kind, &self.researcher, &self.identifier, &e.to_string());
                Err(e)
            }
        }
    }
}

/// Fetch orchestrator: fans one researcher's aggregation out to every
/// configured source.
pub struct Orchestrator {
    sources: Vec<SourceKind>,
    clients: HashMap<SourceKind, Arc<dyn SourceClient>>,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<RateLimiter>,
    health: Arc<SourceHealth>,
    refresh_mode: RefreshMode,
    timeout: Duration,
}

impl Orchestrator {
    /// Build with explicit clients (tests, alternative backends).
    ///
    /// Only sources listed in `config.sources` with a matching client are
    /// queried.
    pub fn new(
        config: &AggregateConfig,
        clients: Vec<Arc<dyn SourceClient>>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let clients: HashMap<SourceKind, Arc<dyn SourceClient>> =
            clients.into_iter().map(|c| (c.kind(), c)).collect();
        let mut sources = Vec::new();
        for kind in &config.sources {
            if clients.contains_key(kind) && !sources.contains(kind) {
                sources.push(*kind);
            }
        }
        Self {
            sources,
            clients,
            cache,
            limiter: Arc::new(RateLimiter::from_config(config)),
            health: Arc::new(SourceHealth::new(config.breaker.clone())),
            refresh_mode: config.refresh_mode,
            timeout: Duration::from_secs(config.aggregate_timeout_secs),
        }
    }

    /// Build with the live HTTP clients for every enabled source.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Config`] for an invalid configuration, or
    /// [`TwinError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AggregateConfig, cache: Arc<dyn CacheStore>) -> Result<Self, TwinError> {
        config.validate()?;
        Ok(Self::new(config, default_clients(config)?, cache))
    }

    pub fn health(&self) -> &SourceHealth {
        &self.health
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Aggregate every configured source for `researcher`.
    ///
    /// Never fails: each source ends up `connected`, `degraded`, or
    /// `unavailable` in the returned reports. Sources the researcher has no
    /// identifier for are reported unavailable without a fetch.
    pub async fn aggregate(&self, researcher: &ResearcherRecord) -> ResearcherRawData {
        let mut raw = ResearcherRawData {
            researcher: researcher.key.clone(),
            ..Default::default()
        };
        let deadline = tokio::time::Instant::now() + self.timeout;

        let mut handles = Vec::new();
        for kind in &self.sources {
            let Some(client) = self.clients.get(kind) else {
                continue;
            };
            let Some(identifier) = researcher.identifier(*kind) else {
                raw.record(*kind, None, SourceReport::unavailable("no identifier configured"));
                continue;
            };
            let task = SourceTask {
                client: Arc::clone(client),
                cache: Arc::clone(&self.cache),
                limiter: Arc::clone(&self.limiter),
                health: Arc::clone(&self.health),
                researcher: researcher.key.clone(),
                identifier: identifier.to_string(),
                refresh_mode: self.refresh_mode,
            };
            handles.push((*kind, tokio::spawn(task.run())));
        }

        let outcomes = futures::future::join_all(handles.into_iter().map(|(kind, handle)| async move {
            (kind, tokio::time::timeout_at(deadline, handle).await)
        }))
        .await;

        for (kind, outcome) in outcomes {
            match outcome {
                Ok(Ok((data, report))) => raw.record(kind, data, report),
                Ok(Err(join_err)) => {
                    tracing::warn!(source = %kind, error = %join_err, "source task failed");
                    raw.record(kind, None, SourceReport::unavailable("source task failed"));
                }
                Err(_) => {
                    tracing::warn!(source = %kind, researcher = %researcher.key, "source abandoned at deadline");
                    raw.record(kind, None, SourceReport::unavailable("timed out"));
                }
            }
        }

        let connected = raw
            .reports
            .values()
            .filter(|r| r.status != SourceStatus::Unavailable)
            .count();
        tracing::info!(
            researcher = %researcher.key,
            sources = raw.reports.len(),
            connected,
            "aggregation complete"
        );
        raw
    }
}
