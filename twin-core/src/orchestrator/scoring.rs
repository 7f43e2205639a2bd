//! QIC artifact scoring and the researcher S-Index.
//!
//! Per artifact: `s = Q × I × C`
//!
//! ```text
//! Q = 0                                   unless public and licensed
//! Q = 5 × (1 + 0.5·pid + 0.3·docs + 0.2·fmt)
//! I = 1 + ln(1 + reuse / μ)               μ = 50 datasets, 10 repositories
//! C = sqrt(max(1, authors) × max(1, institutions))
//! ```
//!
//! Per researcher: `P = h × (1 + log10(citations + 1))` and
//! `S-Index = P + Σ s` over deduplicated datasets and repositories.
//! Publications feed only `P`.
//!
//! Every function here is pure; sums run in identifier order so the result
//! does not depend on fetch order.

use serde::{Deserialize, Serialize};

use crate::types::{Artifact, ArtifactKind, PublicationStats};

/// Base quality once the public + licensed gate passes.
pub const QUALITY_BASE: f64 = 5.0;
pub const PERSISTENT_ID_BONUS: f64 = 0.5;
pub const DOCUMENTATION_BONUS: f64 = 0.3;
pub const STRUCTURED_FORMAT_BONUS: f64 = 0.2;

/// Field-normalisation constant μ for datasets (downloads + views).
pub const DATASET_REUSE_MEDIAN: f64 = 50.0;
/// Field-normalisation constant μ for repositories (stars + forks).
pub const REPOSITORY_REUSE_MEDIAN: f64 = 10.0;

/// The three factors and their product for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactScore {
    pub quality: f64,
    pub impact: f64,
    pub collaboration: f64,
    pub score: f64,
}

/// One scored dataset or repository in a [`ScoreBreakdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArtifact {
    pub identifier: String,
    pub title: String,
    pub kind: ArtifactKind,
    #[serde(flatten)]
    pub score: ArtifactScore,
}

/// Researcher-level score with its per-artifact parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub paper_impact: f64,
    /// Sorted by identifier.
    pub artifacts: Vec<ScoredArtifact>,
    pub artifact_total: f64,
    pub s_index: f64,
}

impl ScoreBreakdown {
    /// Score of the artifact with this primary identifier.
    pub fn score_of(&self, identifier: &str) -> Option<f64> {
        self.artifacts
            .binary_search_by(|a| a.identifier.as_str().cmp(identifier))
            .ok()
            .map(|idx| self.artifacts[idx].score.score)
    }
}

/// Field-normalisation constant for a kind; publications have none.
pub fn reuse_median(kind: ArtifactKind) -> Option<f64> {
    match kind {
        ArtifactKind::Dataset => Some(DATASET_REUSE_MEDIAN),
        ArtifactKind::Repository => Some(REPOSITORY_REUSE_MEDIAN),
        ArtifactKind::Publication => None,
    }
}

/// Quality factor: exactly 0, or in `[5, 10]`.
pub fn quality(artifact: &Artifact) -> f64 {
    if !(artifact.is_public && artifact.has_license) {
        return 0.0;
    }
    let mut bonus = 0.0;
    if artifact.persistent_id.is_some() {
        bonus += PERSISTENT_ID_BONUS;
    }
    if artifact.has_documentation {
        bonus += DOCUMENTATION_BONUS;
    }
    if artifact.structured_format {
        bonus += STRUCTURED_FORMAT_BONUS;
    }
    QUALITY_BASE * (1.0 + bonus)
}

/// Impact factor for `reuse` events against median `mu`. Always ≥ 1.
pub fn impact(reuse: u64, mu: f64) -> f64 {
    1.0 + (reuse as f64 / mu).ln_1p()
}

/// Collaboration factor, both counts floored at 1. Always ≥ 1.
pub fn collaboration(authors: usize, institutions: usize) -> f64 {
    let a = authors.max(1) as f64;
    let i = institutions.max(1) as f64;
    (a * i).sqrt()
}

/// QIC score of a dataset or repository; `None` for publications.
pub fn score_artifact(artifact: &Artifact) -> Option<ArtifactScore> {
    let mu = reuse_median(artifact.kind())?;
    let q = quality(artifact);
    let i = impact(artifact.reuse.total(), mu);
    let c = collaboration(artifact.authors.len(), artifact.institutions.len());
    Some(ArtifactScore {
        quality: q,
        impact: i,
        collaboration: c,
        score: q * i * c,
    })
}

/// Paper impact from aggregate publication statistics.
pub fn paper_impact(h_index: u32, citation_count: u64) -> f64 {
    f64::from(h_index) * (1.0 + (citation_count as f64 + 1.0).log10())
}

/// Score every dataset and repository and combine with paper impact.
///
/// Publications in `artifacts` are ignored. The result is identical for any
/// ordering of `artifacts`.
pub fn score_researcher(stats: &PublicationStats, artifacts: &[&Artifact]) -> ScoreBreakdown {
    let mut scored: Vec<ScoredArtifact> = artifacts
        .iter()
        .filter_map(|a| {
            score_artifact(a).map(|score| ScoredArtifact {
                identifier: a.primary_identifier().to_string(),
                title: a.title.clone(),
                kind: a.kind(),
                score,
            })
        })
        .collect();
    scored.sort_by(|a, b| a.identifier.cmp(&b.identifier).then_with(|| a.title.cmp(&b.title)));

    let artifact_total: f64 = scored.iter().map(|s| s.score.score).sum();
    let p = paper_impact(stats.h_index, stats.citation_count);
    ScoreBreakdown {
        paper_impact: p,
        artifacts: scored,
        artifact_total,
        s_index: p + artifact_total,
    }
}
