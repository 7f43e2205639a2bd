//! `TwinService`: the facade behind the HTTP API.
//!
//! Wires the researcher registry, the fetch orchestrator, the profile
//! snapshot store and the optional answer generator together. Every read
//! goes through [`TwinService::refresh`], which aggregates (cheap when the
//! cache is fresh) and atomically publishes the rebuilt profile.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twin_core::{
    AggregateConfig, ArtifactKind, CacheStore, ContextItem, ContextLimits, ContextPayload,
    DiscoverFilter, DiscoverHit, MemoryCacheStore, Orchestrator, ProfileSnapshots,
    PublicationStats, ResearcherProfile, ScoreBreakdown, SourceKind, SourceReport,
    artifact_items, build_context,
};

use crate::answer::{AnswerGenerator, OpenAiCompatibleClient};
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::store::{Database, ResearcherRegistry, SqliteCacheStore, cache::entry_counts};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// One registry entry as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearcherSummary {
    pub slug: String,
    pub display_name: String,
}

/// Response of `GetContext`: scores, source states and the bounded context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResponse {
    pub researcher_slug: String,
    pub display_name: String,
    pub s_index: f64,
    pub paper_impact: f64,
    pub stats: PublicationStats,
    pub scores: ScoreBreakdown,
    pub sources: BTreeMap<SourceKind, SourceReport>,
    pub context: ContextPayload,
}

/// Machine-readable researcher summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub slug: String,
    pub name: String,
    pub s_index: f64,
    pub paper_impact: f64,
    pub artifact_total: f64,
    pub stats: PublicationStats,
    pub publication_count: usize,
    pub dataset_count: usize,
    pub repository_count: usize,
    pub affiliations: Vec<twin_core::Affiliation>,
    pub sources: BTreeMap<SourceKind, SourceReport>,
    /// Per-kind item list paths.
    pub resources: BTreeMap<String, String>,
}

/// Every item of one kind for one researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    pub researcher: String,
    pub kind: ArtifactKind,
    pub total: usize,
    pub items: Vec<ContextItem>,
}

/// Result of a cross-researcher search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub query: String,
    pub type_filter: DiscoverFilter,
    pub total: usize,
    pub results: Vec<DiscoverHit>,
}

/// A generated chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub researcher_slug: String,
}

/// The service facade.
pub struct TwinService {
    db: Database,
    registry: ResearcherRegistry,
    orchestrator: Orchestrator,
    snapshots: ProfileSnapshots,
    answer: Option<Arc<dyn AnswerGenerator>>,
    context_limits: ContextLimits,
    discover_limit: usize,
}

impl TwinService {
    /// Assemble from parts. `aggregate` supplies the context and discover caps.
    pub fn new(
        db: Database,
        orchestrator: Orchestrator,
        answer: Option<Arc<dyn AnswerGenerator>>,
        aggregate: &AggregateConfig,
    ) -> Self {
        Self {
            registry: ResearcherRegistry::new(db.clone()),
            db,
            orchestrator,
            snapshots: ProfileSnapshots::new(),
            answer,
            context_limits: aggregate.context.clone(),
            discover_limit: aggregate.discover_limit,
        }
    }

    /// Build the live service: open storage, seed the registry, create the
    /// source clients and the answer client.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the configuration is invalid or storage
    /// cannot be opened.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let (db, cache): (Database, Arc<dyn CacheStore>) = match &config.storage.database_path {
            Some(path) => {
                info!(path = %path.display(), "opening database");
                let db = Database::open(path)?;
                let cache = Arc::new(SqliteCacheStore::new(db.clone()));
                (db, cache)
            }
            None => {
                warn!("no database path configured, registry and cache are in-memory");
                (Database::open_in_memory()?, Arc::new(MemoryCacheStore::default()))
            }
        };

        let orchestrator = Orchestrator::from_config(&config.aggregate, cache)?;
        let answer = OpenAiCompatibleClient::from_config(&config.answer)?
            .map(|c| Arc::new(c) as Arc<dyn AnswerGenerator>);
        if answer.is_none() {
            info!("answer.endpoint not set, chat disabled");
        }

        let service = Self::new(db, orchestrator, answer, &config.aggregate);
        if config.storage.seed_registry {
            service.registry.seed_if_empty().await?;
        }
        Ok(service)
    }

    pub fn registry(&self) -> &ResearcherRegistry {
        &self.registry
    }

    pub fn snapshots(&self) -> &ProfileSnapshots {
        &self.snapshots
    }

    pub fn chat_enabled(&self) -> bool {
        self.answer.is_some()
    }

    /// Active researchers, ordered by slug.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on a registry failure.
    pub async fn researchers(&self) -> Result<Vec<ResearcherSummary>> {
        Ok(self
            .registry
            .list()
            .await?
            .into_iter()
            .map(|r| ResearcherSummary {
                slug: r.key,
                display_name: r.display_name,
            })
            .collect())
    }

    /// Aggregate one researcher and publish the rebuilt profile.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] for a malformed slug and
    /// [`ServiceError::UnknownResearcher`] when no active researcher has it.
    pub async fn refresh(&self, slug: &str) -> Result<Arc<ResearcherProfile>> {
        let record = self
            .registry
            .get(slug)
            .await
            .map_err(|e| match e {
                crate::error::StoreError::InvalidSlug(msg) => ServiceError::InvalidInput(msg),
                other => other.into(),
            })?
            .ok_or_else(|| ServiceError::UnknownResearcher(slug.to_owned()))?;

        let profile = twin_core::aggregate_profile(&self.orchestrator, &record).await;
        debug!(
            researcher = %record.key,
            connected = profile.connected_sources(),
            stale = profile.is_stale(),
            s_index = profile.s_index,
            "profile rebuilt"
        );
        Ok(self.snapshots.publish(profile))
    }

    /// `GetContext`: scores, source states and the bounded context payload.
    ///
    /// # Errors
    ///
    /// See [`TwinService::refresh`].
    pub async fn get_context(&self, slug: &str) -> Result<ContextResponse> {
        let profile = self.refresh(slug).await?;
        Ok(ContextResponse {
            researcher_slug: profile.key.clone(),
            display_name: profile.display_name.clone(),
            s_index: profile.s_index,
            paper_impact: profile.scores.paper_impact,
            stats: profile.stats,
            scores: profile.scores.clone(),
            sources: profile.sources.clone(),
            context: build_context(&profile, &self.context_limits),
        })
    }

    /// Machine-readable summary for one researcher.
    ///
    /// # Errors
    ///
    /// See [`TwinService::refresh`].
    pub async fn profile(&self, slug: &str) -> Result<ProfileSummary> {
        let profile = self.refresh(slug).await?;
        let resources = ["papers", "datasets", "repos"]
            .into_iter()
            .map(|kind| (kind.to_owned(), format!("/api/researcher/{}/{kind}", profile.key)))
            .collect();
        Ok(ProfileSummary {
            slug: profile.key.clone(),
            name: profile.display_name.clone(),
            s_index: profile.s_index,
            paper_impact: profile.scores.paper_impact,
            artifact_total: profile.scores.artifact_total,
            stats: profile.stats,
            publication_count: profile.publications.len(),
            dataset_count: profile.datasets.len(),
            repository_count: profile.repositories.len(),
            affiliations: profile.affiliations.clone(),
            sources: profile.sources.clone(),
            resources,
        })
    }

    /// Every item of `kind`, ranked, uncapped.
    ///
    /// # Errors
    ///
    /// See [`TwinService::refresh`].
    pub async fn items(&self, slug: &str, kind: ArtifactKind) -> Result<ItemList> {
        let profile = self.refresh(slug).await?;
        let items = artifact_items(&profile, kind, &self.context_limits);
        Ok(ItemList {
            researcher: profile.key.clone(),
            kind,
            total: items.len(),
            items,
        })
    }

    /// `Discover`: search every active researcher's artifacts by title.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] for an out-of-bounds query and
    /// [`ServiceError::Store`] on a registry failure.
    pub async fn discover(&self, query: &str, filter: DiscoverFilter) -> Result<DiscoverResponse> {
        twin_core::validate_query(query)?;
        let records = self.registry.list().await?;

        let refreshed = join_all(records.iter().map(|r| self.refresh(&r.key))).await;
        let mut profiles = Vec::with_capacity(refreshed.len());
        for (record, result) in records.iter().zip(refreshed) {
            match result {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!(researcher = %record.key, error = %e, "skipping researcher in discover"),
            }
        }

        let results = twin_core::discover(
            profiles.iter().map(|p| p.as_ref()),
            query,
            filter,
            self.discover_limit,
        )?;
        info!(query = %query.trim(), filter = ?filter, hits = results.len(), "discover");
        Ok(DiscoverResponse {
            query: query.trim().to_owned(),
            type_filter: filter,
            total: results.len(),
            results,
        })
    }

    /// Answer a question about one researcher from their rendered context.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] for an empty or oversized
    /// message, [`ServiceError::UnknownResearcher`],
    /// [`ServiceError::AnswerUnavailable`] when no generator is configured,
    /// and [`ServiceError::Answer`] when generation fails.
    pub async fn chat(&self, slug: &str, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        let len = message.chars().count();
        if len == 0 || len > MAX_MESSAGE_CHARS {
            return Err(ServiceError::InvalidInput(format!(
                "message must be 1-{MAX_MESSAGE_CHARS} characters"
            )));
        }
        let profile = self.refresh(slug).await?;
        let Some(answer) = &self.answer else {
            return Err(ServiceError::AnswerUnavailable(
                "no answer endpoint configured".into(),
            ));
        };

        let context = build_context(&profile, &self.context_limits).render_text();
        info!(researcher = %profile.key, message_len = len, "chat");
        let reply = answer
            .answer(&profile.display_name, &context, message)
            .await
            .inspect_err(|e| warn!(researcher = %profile.key, error = %e, "answer generation failed"))?;
        Ok(ChatReply {
            reply,
            researcher_slug: profile.key.clone(),
        })
    }

    /// Cached payload rows per source in the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on a database failure.
    pub async fn cache_counts(&self) -> Result<Vec<(SourceKind, u64)>> {
        Ok(entry_counts(&self.db).await?)
    }
}
