//! Keyword discovery across every locally known researcher.
//!
//! Matches are ranked by QIC score for datasets and repositories and by
//! citation count for publications, mixed into one descending list.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TwinError};
use crate::profile::ResearcherProfile;
use crate::types::{Artifact, ArtifactKind};

/// Accepted query length in characters, after trimming.
pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 200;

/// Which artifact kinds a discovery query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverFilter {
    Paper,
    Dataset,
    Repo,
    #[default]
    All,
}

impl DiscoverFilter {
    pub fn accepts(&self, kind: ArtifactKind) -> bool {
        matches!(
            (self, kind),
            (Self::All, _)
                | (Self::Paper, ArtifactKind::Publication)
                | (Self::Dataset, ArtifactKind::Dataset)
                | (Self::Repo, ArtifactKind::Repository)
        )
    }
}

impl FromStr for DiscoverFilter {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paper" | "papers" => Ok(Self::Paper),
            "dataset" | "datasets" => Ok(Self::Dataset),
            "repo" | "repos" | "repository" => Ok(Self::Repo),
            "all" | "" => Ok(Self::All),
            other => Err(TwinError::InvalidInput(format!(
                "unknown type filter '{other}' (expected paper, dataset, repo or all)"
            ))),
        }
    }
}

/// One ranked discovery result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverHit {
    pub researcher: String,
    pub researcher_name: String,
    pub kind: ArtifactKind,
    pub identifier: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Citations, downloads + views, or stars + forks.
    pub reuse: u64,
    /// QIC score for datasets and repositories; citations for publications.
    pub rank_value: f64,
}

fn hit(profile: &ResearcherProfile, artifact: &Artifact) -> DiscoverHit {
    let rank_value = match artifact.kind() {
        ArtifactKind::Publication => artifact.reuse.total() as f64,
        ArtifactKind::Dataset | ArtifactKind::Repository => {
            profile.artifact_score(artifact).unwrap_or(0.0)
        }
    };
    DiscoverHit {
        researcher: profile.key.clone(),
        researcher_name: profile.display_name.clone(),
        kind: artifact.kind(),
        identifier: artifact.primary_identifier().to_string(),
        title: artifact.title.clone(),
        year: artifact.year,
        url: artifact.url.clone(),
        reuse: artifact.reuse.total(),
        rank_value,
    }
}

/// Trim and lower-case a query, enforcing the length bounds.
///
/// # Errors
///
/// Returns [`TwinError::InvalidInput`] when the trimmed query is out of bounds.
pub fn validate_query(query: &str) -> Result<String> {
    let trimmed = query.trim();
    let len = trimmed.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&len) {
        return Err(TwinError::InvalidInput(format!(
            "query must be {MIN_QUERY_CHARS}-{MAX_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed.to_lowercase())
}

/// Case-insensitive substring search over artifact titles.
///
/// # Errors
///
/// Returns [`TwinError::InvalidInput`] if the trimmed query is shorter than
/// [`MIN_QUERY_CHARS`] or longer than [`MAX_QUERY_CHARS`].
pub fn discover<'a, I>(
    profiles: I,
    query: &str,
    filter: DiscoverFilter,
    limit: usize,
) -> Result<Vec<DiscoverHit>>
where
    I: IntoIterator<Item = &'a ResearcherProfile>,
{
    let needle = validate_query(query)?;
    let mut hits = Vec::new();
    for profile in profiles {
        let artifacts = profile
            .publications
            .iter()
            .chain(&profile.datasets)
            .chain(&profile.repositories);
        for artifact in artifacts {
            if filter.accepts(artifact.kind()) && artifact.title.to_lowercase().contains(&needle) {
                hits.push(hit(profile, artifact));
            }
        }
    }
    hits.sort_by(|a, b| {
        b.rank_value
            .partial_cmp(&a.rank_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.researcher.cmp(&b.researcher))
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    hits.truncate(limit);
    tracing::debug!(results = hits.len(), filter = ?filter, "discover");
    Ok(hits)
}
