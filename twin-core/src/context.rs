//! Bounded context payload for the answer-generation hand-off.
//!
//! The payload always carries the researcher's aggregate statistics and
//! score summary. Artifact lists are capped per category, keeping the
//! highest-ranked items (citations for publications, QIC score for datasets
//! and repositories) and reporting how many were omitted.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::ContextLimits;
use crate::profile::ResearcherProfile;
use crate::source::truncate_chars;
use crate::types::{
    Affiliation, Artifact, ArtifactKind, PublicationStats, SourceKind, SourceReport,
};

/// One artifact as presented to the answer generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub identifier: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Citations, downloads + views, or stars + forks.
    pub reuse: u64,
    /// QIC score; absent for publications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Items left out of the payload by the per-category cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedCounts {
    pub publications: usize,
    pub datasets: usize,
    pub repositories: usize,
}

impl OmittedCounts {
    pub fn total(&self) -> usize {
        self.publications + self.datasets + self.repositories
    }
}

/// Structured summary of one researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub researcher: String,
    pub display_name: String,
    pub stats: PublicationStats,
    pub s_index: f64,
    pub paper_impact: f64,
    pub artifact_total: f64,
    pub datasets_scored: usize,
    pub repositories_scored: usize,
    pub publications: Vec<ContextItem>,
    pub datasets: Vec<ContextItem>,
    pub repositories: Vec<ContextItem>,
    pub affiliations: Vec<Affiliation>,
    pub omitted: OmittedCounts,
    pub sources: BTreeMap<SourceKind, SourceReport>,
}

fn context_item(
    artifact: &Artifact,
    profile: &ResearcherProfile,
    limits: &ContextLimits,
) -> ContextItem {
    ContextItem {
        identifier: artifact.primary_identifier().to_string(),
        title: artifact.title.clone(),
        year: artifact.year,
        venue: artifact.venue.clone(),
        reuse: artifact.reuse.total(),
        score: profile.artifact_score(artifact),
        persistent_id: artifact.persistent_id.clone(),
        url: artifact.url.clone(),
        item_type: artifact.item_type.clone(),
        description: artifact
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(d, limits.max_description_chars)),
    }
}

/// Keep the first `cap` of an already-ranked list.
fn capped(
    artifacts: &[Artifact],
    profile: &ResearcherProfile,
    limits: &ContextLimits,
) -> (Vec<ContextItem>, usize) {
    let kept: Vec<ContextItem> = artifacts
        .iter()
        .take(limits.max_per_category)
        .map(|a| context_item(a, profile, limits))
        .collect();
    let omitted = artifacts.len() - kept.len();
    (kept, omitted)
}

/// Every artifact of `kind` in ranked order, without the per-category cap.
/// Descriptions are still truncated.
pub fn artifact_items(
    profile: &ResearcherProfile,
    kind: ArtifactKind,
    limits: &ContextLimits,
) -> Vec<ContextItem> {
    let artifacts = match kind {
        ArtifactKind::Publication => &profile.publications,
        ArtifactKind::Dataset => &profile.datasets,
        ArtifactKind::Repository => &profile.repositories,
    };
    artifacts
        .iter()
        .map(|a| context_item(a, profile, limits))
        .collect()
}

/// Build the context payload for `profile` under `limits`.
///
/// Profile artifact lists are already ranked (publications by citations,
/// datasets and repositories by score), so truncation keeps their heads.
pub fn build_context(profile: &ResearcherProfile, limits: &ContextLimits) -> ContextPayload {
    let (publications, omitted_publications) = capped(&profile.publications, profile, limits);
    let (datasets, omitted_datasets) = capped(&profile.datasets, profile, limits);
    let (repositories, omitted_repositories) = capped(&profile.repositories, profile, limits);

    ContextPayload {
        researcher: profile.key.clone(),
        display_name: profile.display_name.clone(),
        stats: profile.stats,
        s_index: profile.s_index,
        paper_impact: profile.scores.paper_impact,
        artifact_total: profile.scores.artifact_total,
        datasets_scored: profile.datasets.len(),
        repositories_scored: profile.repositories.len(),
        publications,
        datasets,
        repositories,
        affiliations: profile.affiliations.clone(),
        omitted: OmittedCounts {
            publications: omitted_publications,
            datasets: omitted_datasets,
            repositories: omitted_repositories,
        },
        sources: profile.sources.clone(),
    }
}

fn render_items(out: &mut String, heading: &str, items: &[ContextItem], omitted: usize, unit: &str) {
    let _ = writeln!(out, "## {heading}");
    if items.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for item in items {
        let year = item.year.map_or_else(|| "?".to_string(), |y| y.to_string());
        let _ = write!(out, "- {} ({year}): {} {unit}", item.title, item.reuse);
        if let Some(score) = item.score {
            let _ = write!(out, ", score {score:.1}");
        }
        let _ = writeln!(out);
        if let Some(pid) = &item.persistent_id {
            let _ = writeln!(out, "  DOI: {pid}");
        }
        if let Some(desc) = &item.description {
            let _ = writeln!(out, "  {desc}");
        }
    }
    if omitted > 0 {
        let _ = writeln!(out, "({omitted} more not shown)");
    }
    let _ = writeln!(out);
}

impl ContextPayload {
    /// Plain-text rendering handed to the answer generator.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Research Profile: {}", self.display_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "## S-Index (Quality x Impact x Collaboration)");
        let _ = writeln!(out, "Total S-Index: {:.1}", self.s_index);
        let _ = writeln!(
            out,
            "Paper Impact (P): {:.1} | Artifact Total: {:.1}",
            self.paper_impact, self.artifact_total
        );
        let _ = writeln!(
            out,
            "Papers: {} | Citations: {} | h-index: {} | i10-index: {}",
            self.stats.paper_count,
            self.stats.citation_count,
            self.stats.h_index,
            self.stats.i10_index
        );
        let _ = writeln!(
            out,
            "Datasets scored: {} | Repositories scored: {}",
            self.datasets_scored, self.repositories_scored
        );
        let _ = writeln!(out);

        render_items(&mut out, "Top Publications", &self.publications, self.omitted.publications, "citations");
        render_items(&mut out, "Datasets", &self.datasets, self.omitted.datasets, "downloads+views");
        render_items(&mut out, "Repositories", &self.repositories, self.omitted.repositories, "stars+forks");

        if !self.affiliations.is_empty() {
            let _ = writeln!(out, "## Affiliations");
            for aff in &self.affiliations {
                let current = if aff.current { " (current)" } else { "" };
                let _ = writeln!(out, "- {}, {} {}{current}", aff.institution, aff.city, aff.country);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "## Sources");
        for (kind, report) in &self.sources {
            let stale = if report.stale { ", stale" } else { "" };
            let _ = writeln!(out, "- {kind}: {:?}{stale}", report.status);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ResearcherRawData;
    use crate::profile::build_profile;
    use crate::types::{ResearcherRecord, Reuse, SourceData};

    fn repo(n: u64) -> Artifact {
        let id = format!("gh:jane/r{n:02}");
        let mut a = Artifact::new(SourceKind::GitHub, id.clone(), id, Reuse::Repository { stars: n, forks: 0 });
        a.is_public = true;
        a.has_license = true;
        a.description = Some("x".repeat(500));
        a
    }

    fn profile_with_repos(count: u64) -> ResearcherProfile {
        let mut raw = ResearcherRawData {
            researcher: "jane".into(),
            ..Default::default()
        };
        raw.data.insert(
            SourceKind::GitHub,
            SourceData {
                artifacts: (0..count).map(repo).collect(),
                ..Default::default()
            },
        );
        raw.data.insert(
            SourceKind::SemanticScholar,
            SourceData {
                stats: Some(PublicationStats {
                    paper_count: 120,
                    citation_count: 1200,
                    h_index: 18,
                    i10_index: 0,
                }),
                ..Default::default()
            },
        );
        raw.reports.insert(SourceKind::GitHub, SourceReport::connected(1));
        raw.reports.insert(SourceKind::SemanticScholar, SourceReport::degraded(1, "HTTP 503"));
        build_profile(&ResearcherRecord::new("jane", "Jane Doe"), &raw)
    }

    #[test]
    fn artifact_items_are_uncapped() {
        let profile = profile_with_repos(25);
        let limits = ContextLimits {
            max_per_category: 10,
            max_description_chars: 40,
        };
        let repos = artifact_items(&profile, ArtifactKind::Repository, &limits);
        assert_eq!(repos.len(), 25);
        assert_eq!(repos[0].identifier, "gh:jane/r24");
        assert!(repos.iter().all(|r| r.score.is_some()));
        assert!(artifact_items(&profile, ArtifactKind::Publication, &limits).is_empty());
    }

    #[test]
    fn caps_keep_highest_scored_items() {
        let profile = profile_with_repos(25);
        let limits = ContextLimits {
            max_per_category: 10,
            max_description_chars: 200,
        };
        let ctx = build_context(&profile, &limits);

        assert_eq!(ctx.repositories.len(), 10);
        assert_eq!(ctx.omitted.repositories, 15);
        assert_eq!(ctx.repositories_scored, 25);
        assert_eq!(ctx.repositories[0].identifier, "gh:jane/r24");
        let scores: Vec<f64> = ctx.repositories.iter().filter_map(|r| r.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn stats_survive_any_cap() {
        let profile = profile_with_repos(3);
        let limits = ContextLimits {
            max_per_category: 1,
            max_description_chars: 10,
        };
        let ctx = build_context(&profile, &limits);
        assert_eq!(ctx.stats.h_index, 18);
        assert_eq!(ctx.stats.citation_count, 1200);
        assert_eq!(ctx.s_index, profile.s_index);
        assert_eq!(ctx.repositories[0].description.as_deref().map(str::len), Some(10));
    }

    #[test]
    fn render_text_includes_summary_and_status() {
        let ctx = build_context(&profile_with_repos(2), &ContextLimits::default());
        let text = ctx.render_text();
        assert!(text.starts_with("# Research Profile: Jane Doe"));
        assert!(text.contains("h-index: 18"));
        assert!(text.contains("gh:jane/r01"));
        assert!(text.contains("semantic_scholar: Degraded, stale"));
        assert!(text.contains("## Top Publications\n(none)"));
    }
}
