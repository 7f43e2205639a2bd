//! Core types: sources, artifacts, and per-source status.
//!
//! Every source client normalises its native payload into [`Artifact`]
//! at the boundary; nothing downstream sees source-specific shapes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// External sources the orchestrator can fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Primary publication index.
    #[serde(rename = "semantic_scholar")]
    SemanticScholar,
    /// Secondary, overlapping publication index.
    #[serde(rename = "google_scholar")]
    GoogleScholar,
    /// Code-host index.
    #[serde(rename = "github")]
    GitHub,
    /// Dataset-repository index.
    #[serde(rename = "figshare")]
    Figshare,
    /// Affiliation directory.
    #[serde(rename = "affiliations")]
    Affiliations,
}

impl SourceKind {
    /// Stable machine name, used in cache keys, logs and API output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SemanticScholar => "semantic_scholar",
            Self::GoogleScholar => "google_scholar",
            Self::GitHub => "github",
            Self::Figshare => "figshare",
            Self::Affiliations => "affiliations",
        }
    }

    /// Parse a machine name back into a source kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    /// Cache TTL class for payloads from this source.
    pub fn ttl_class(&self) -> TtlClass {
        match self {
            Self::GoogleScholar => TtlClass::SecondaryPublications,
            Self::Affiliations => TtlClass::Affiliation,
            Self::SemanticScholar | Self::GitHub | Self::Figshare => TtlClass::General,
        }
    }

    /// Returns all source variants, primary publication source first.
    pub fn all() -> &'static [SourceKind] {
        &[
            Self::SemanticScholar,
            Self::GoogleScholar,
            Self::GitHub,
            Self::Figshare,
            Self::Affiliations,
        ]
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cache lifetime class, fixed per source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// General artifact sources: 24 hours.
    General,
    /// The overlapping secondary publication source: 48 hours.
    SecondaryPublications,
    /// Affiliation / location data: 30 days.
    Affiliation,
}

impl TtlClass {
    /// Lifetime in seconds.
    pub fn ttl_secs(&self) -> u64 {
        const DAY: u64 = 86_400;
        match self {
            Self::General => DAY,
            Self::SecondaryPublications => 2 * DAY,
            Self::Affiliation => 30 * DAY,
        }
    }
}

/// Which of the three artifact variants a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Publication,
    Dataset,
    Repository,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Publication => "publication",
            Self::Dataset => "dataset",
            Self::Repository => "repository",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The variant-specific reuse signal. Doubles as the artifact's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reuse {
    Publication { citations: u64 },
    Dataset { downloads: u64, views: u64 },
    Repository { stars: u64, forks: u64 },
}

impl Reuse {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Publication { .. } => ArtifactKind::Publication,
            Self::Dataset { .. } => ArtifactKind::Dataset,
            Self::Repository { .. } => ArtifactKind::Repository,
        }
    }

    /// Combined reuse count: citations, downloads + views, or stars + forks.
    pub fn total(&self) -> u64 {
        match *self {
            Self::Publication { citations } => citations,
            Self::Dataset { downloads, views } => downloads.saturating_add(views),
            Self::Repository { stars, forks } => stars.saturating_add(forks),
        }
    }
}

/// A publication, dataset, or code repository belonging to a researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Canonical title.
    pub title: String,
    /// External identifiers, prefixed by namespace (`s2:`, `doi:`, `gh:` …).
    /// Never empty once a source client has produced the artifact.
    pub identifiers: BTreeSet<String>,
    /// Sources the record was observed in.
    pub sources: BTreeSet<SourceKind>,
    /// Author names, in byline order.
    pub authors: Vec<String>,
    pub institutions: BTreeSet<String>,
    pub reuse: Reuse,
    pub is_public: bool,
    pub has_license: bool,
    /// DOI or equivalent.
    pub persistent_id: Option<String>,
    pub has_documentation: bool,
    pub structured_format: bool,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub url: Option<String>,
    /// Source-native item type (e.g. `figure`, `dataset`, `media`).
    pub item_type: Option<String>,
    pub description: Option<String>,
    /// Fragment group this record represents, set by dataset grouping so a
    /// regrouped representative keeps its group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_group: Option<String>,
}

impl Artifact {
    /// Create an artifact with a single identifier from a single source.
    ///
    /// All optional metadata starts empty and all flags start `false`.
    pub fn new(
        source: SourceKind,
        identifier: impl Into<String>,
        title: impl Into<String>,
        reuse: Reuse,
    ) -> Self {
        Self {
            title: title.into(),
            identifiers: BTreeSet::from([identifier.into()]),
            sources: BTreeSet::from([source]),
            authors: Vec::new(),
            institutions: BTreeSet::new(),
            reuse,
            is_public: false,
            has_license: false,
            persistent_id: None,
            has_documentation: false,
            structured_format: false,
            year: None,
            venue: None,
            url: None,
            item_type: None,
            description: None,
            fragment_group: None,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.reuse.kind()
    }

    /// Smallest identifier; a stable handle for sorting and tie-breaks.
    pub fn primary_identifier(&self) -> &str {
        self.identifiers.iter().next().map_or("", String::as_str)
    }
}

/// Aggregate publication statistics reported by a publication source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationStats {
    pub paper_count: u64,
    pub citation_count: u64,
    /// h-like index.
    pub h_index: u32,
    /// i10-like index.
    pub i10_index: u32,
}

/// One institutional affiliation of a researcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub institution: String,
    pub city: String,
    pub country: String,
    /// No end date recorded.
    pub current: bool,
}

/// Everything one source returned for one researcher, already normalised.
///
/// This is the unit the orchestrator publishes atomically and the payload
/// stored in the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub artifacts: Vec<Artifact>,
    pub stats: Option<PublicationStats>,
    pub affiliations: Vec<Affiliation>,
}

/// A researcher's opaque key plus the identifier used at each source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearcherRecord {
    /// Opaque slug.
    pub key: String,
    pub display_name: String,
    pub identifiers: BTreeMap<SourceKind, String>,
}

impl ResearcherRecord {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            identifiers: BTreeMap::new(),
        }
    }

    /// Builder-style identifier setter. Blank identifiers are ignored.
    pub fn with_identifier(mut self, source: SourceKind, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.identifiers.insert(source, id.trim().to_string());
        }
        self
    }

    pub fn identifier(&self, source: SourceKind) -> Option<&str> {
        self.identifiers.get(&source).map(String::as_str)
    }
}

/// Health of one source for one aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Fresh data (from cache or a live fetch).
    Connected,
    /// Refresh failed; a stale cache entry was served instead.
    Degraded,
    /// Nothing could be served for this source.
    Unavailable,
}

/// Per-source status plus staleness metadata, reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    /// The data served is older than its TTL.
    pub stale: bool,
    /// Unix seconds when the served payload was fetched.
    pub fetched_at: Option<i64>,
    /// Short failure description, when relevant.
    pub detail: Option<String>,
}

impl SourceReport {
    pub fn connected(fetched_at: i64) -> Self {
        Self {
            status: SourceStatus::Connected,
            stale: false,
            fetched_at: Some(fetched_at),
            detail: None,
        }
    }

    pub fn degraded(fetched_at: i64, detail: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Degraded,
            stale: true,
            fetched_at: Some(fetched_at),
            detail: Some(detail.into()),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: SourceStatus::Unavailable,
            stale: false,
            fetched_at: None,
            detail: Some(detail.into()),
        }
    }
}
