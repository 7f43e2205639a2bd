//! Researcher profile assembly from raw per-source data.
//!
//! [`build_profile`] is the pure step between the fetch orchestrator and
//! every reader: split artifacts by kind, merge and group duplicates, merge
//! the two sets of publication statistics, and score. The result depends
//! only on the raw data, never on the order sources completed in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::orchestrator::dedup::{group_dataset_fragments, merge_publications};
use crate::orchestrator::scoring::{score_researcher, ScoreBreakdown};
use crate::orchestrator::ResearcherRawData;
use crate::sources::affiliations::same_institution;
use crate::types::{
    Affiliation, Artifact, ArtifactKind, PublicationStats, ResearcherRecord, SourceKind,
    SourceReport, SourceStatus,
};

/// Canonical, immutable profile of one researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherProfile {
    pub key: String,
    pub display_name: String,
    pub stats: PublicationStats,
    /// Merged publications, most cited first.
    pub publications: Vec<Artifact>,
    /// Grouped datasets, highest scored first.
    pub datasets: Vec<Artifact>,
    /// Repositories, highest scored first.
    pub repositories: Vec<Artifact>,
    pub affiliations: Vec<Affiliation>,
    pub scores: ScoreBreakdown,
    pub s_index: f64,
    pub sources: BTreeMap<SourceKind, SourceReport>,
}

impl ResearcherProfile {
    /// Profile for a researcher with no data at all.
    pub fn empty(record: &ResearcherRecord) -> Self {
        build_profile(
            record,
            &ResearcherRawData {
                researcher: record.key.clone(),
                ..Default::default()
            },
        )
    }

    /// QIC score of a dataset or repository in this profile.
    pub fn artifact_score(&self, artifact: &Artifact) -> Option<f64> {
        self.scores.score_of(artifact.primary_identifier())
    }

    /// Sources that served any data, fresh or stale.
    pub fn connected_sources(&self) -> usize {
        self.sources
            .values()
            .filter(|r| r.status != SourceStatus::Unavailable)
            .count()
    }

    /// Whether any served source payload was stale.
    pub fn is_stale(&self) -> bool {
        self.sources.values().any(|r| r.stale)
    }
}

/// Combine the primary and secondary publication statistics.
///
/// Citations and h-index take the larger value; the i10 index comes from the
/// secondary source when it reports one, since the primary does not. The
/// paper count is at least the number of merged publications.
pub fn merge_stats(
    primary: Option<PublicationStats>,
    secondary: Option<PublicationStats>,
    merged_count: usize,
) -> PublicationStats {
    let p = primary.unwrap_or_default();
    let s = secondary.unwrap_or_default();
    let i10_index = match secondary {
        Some(s) if s.i10_index > 0 => s.i10_index,
        _ => p.i10_index,
    };
    PublicationStats {
        paper_count: p.paper_count.max(s.paper_count).max(merged_count as u64),
        citation_count: p.citation_count.max(s.citation_count),
        h_index: p.h_index.max(s.h_index),
        i10_index,
    }
}

/// Collapse affiliations naming the same institution, keeping the first
/// current entry for each.
fn dedup_affiliations(mut affiliations: Vec<Affiliation>) -> Vec<Affiliation> {
    affiliations.sort_by(|a, b| {
        b.current
            .cmp(&a.current)
            .then_with(|| a.institution.cmp(&b.institution))
            .then_with(|| a.city.cmp(&b.city))
    });
    let mut out: Vec<Affiliation> = Vec::new();
    for aff in affiliations {
        if !out
            .iter()
            .any(|seen| same_institution(&seen.institution, &aff.institution))
        {
            out.push(aff);
        }
    }
    out
}

/// Repositories keyed by primary identifier; the same repository seen twice
/// keeps the copy with more reuse.
fn dedup_repositories(repos: Vec<Artifact>) -> Vec<Artifact> {
    let mut by_id: BTreeMap<String, Artifact> = BTreeMap::new();
    for repo in repos {
        let id = repo.primary_identifier().to_string();
        match by_id.get(&id) {
            Some(existing) if existing.reuse.total() >= repo.reuse.total() => {}
            _ => {
                by_id.insert(id, repo);
            }
        }
    }
    by_id.into_values().collect()
}

/// Build the canonical profile for `record` from one aggregation's raw data.
pub fn build_profile(record: &ResearcherRecord, raw: &ResearcherRawData) -> ResearcherProfile {
    let mut publications = Vec::new();
    let mut datasets = Vec::new();
    let mut repositories = Vec::new();
    let mut affiliations = Vec::new();

    for data in raw.data.values() {
        for artifact in &data.artifacts {
            match artifact.kind() {
                ArtifactKind::Publication => publications.push(artifact.clone()),
                ArtifactKind::Dataset => datasets.push(artifact.clone()),
                ArtifactKind::Repository => repositories.push(artifact.clone()),
            }
        }
        affiliations.extend(data.affiliations.iter().cloned());
    }

    let publications = merge_publications(publications);
    let mut datasets = group_dataset_fragments(datasets);
    let mut repositories = dedup_repositories(repositories);

    let stats = merge_stats(
        raw.source(SourceKind::SemanticScholar).and_then(|d| d.stats),
        raw.source(SourceKind::GoogleScholar).and_then(|d| d.stats),
        publications.len(),
    );

    let scored: Vec<&Artifact> = datasets.iter().chain(repositories.iter()).collect();
    let scores = score_researcher(&stats, &scored);

    let by_score = |a: &Artifact, b: &Artifact| {
        let sa = scores.score_of(a.primary_identifier()).unwrap_or(0.0);
        let sb = scores.score_of(b.primary_identifier()).unwrap_or(0.0);
        sb.total_cmp(&sa)
            .then_with(|| a.primary_identifier().cmp(b.primary_identifier()))
    };
    datasets.sort_by(by_score);
    repositories.sort_by(by_score);

    tracing::debug!(
        researcher = %record.key,
        sources = raw.data.len(),
        publications = publications.len(),
        datasets = datasets.len(),
        repositories = repositories.len(),
        s_index = scores.s_index,
        "profile built"
    );

    ResearcherProfile {
        key: record.key.clone(),
        display_name: record.display_name.clone(),
        stats,
        publications,
        datasets,
        repositories,
        affiliations: dedup_affiliations(affiliations),
        s_index: scores.s_index,
        scores,
        sources: raw.reports.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Reuse, SourceData};

    fn record() -> ResearcherRecord {
        ResearcherRecord::new("jane", "Jane Doe")
    }

    fn stats(cites: u64, h: u32, i10: u32, papers: u64) -> PublicationStats {
        PublicationStats {
            paper_count: papers,
            citation_count: cites,
            h_index: h,
            i10_index: i10,
        }
    }

    fn paper(source: SourceKind, id: &str, title: &str, cites: u64) -> Artifact {
        Artifact::new(source, id, title, Reuse::Publication { citations: cites })
    }

    fn repo(id: &str, stars: u64) -> Artifact {
        let mut a = Artifact::new(SourceKind::GitHub, id, id, Reuse::Repository { stars, forks: 0 });
        a.is_public = true;
        a.has_license = true;
        a.authors = vec!["jane".into()];
        a
    }

    fn raw(entries: Vec<(SourceKind, SourceData)>) -> ResearcherRawData {
        let mut raw = ResearcherRawData {
            researcher: "jane".into(),
            ..Default::default()
        };
        for (kind, data) in entries {
            raw.reports.insert(kind, SourceReport::connected(1_700_000_000));
            raw.data.insert(kind, data);
        }
        raw
    }

    #[test]
    fn stats_merge_takes_max_and_secondary_i10() {
        let merged = merge_stats(Some(stats(1200, 18, 0, 120)), Some(stats(1250, 17, 31, 90)), 130);
        assert_eq!(merged.citation_count, 1250);
        assert_eq!(merged.h_index, 18);
        assert_eq!(merged.i10_index, 31);
        assert_eq!(merged.paper_count, 130);
    }

    #[test]
    fn stats_merge_with_one_source() {
        let merged = merge_stats(Some(stats(10, 2, 0, 5)), None, 3);
        assert_eq!(merged, stats(10, 2, 0, 5));
        assert_eq!(merge_stats(None, None, 0), PublicationStats::default());
    }

    #[test]
    fn profile_merges_publications_across_sources() {
        let raw = raw(vec![
            (
                SourceKind::SemanticScholar,
                SourceData {
                    artifacts: vec![paper(
                        SourceKind::SemanticScholar,
                        "s2:1",
                        "Fetal Heart Rate Monitoring via ML",
                        40,
                    )],
                    stats: Some(stats(1200, 18, 0, 1)),
                    ..Default::default()
                },
            ),
            (
                SourceKind::GoogleScholar,
                SourceData {
                    artifacts: vec![paper(
                        SourceKind::GoogleScholar,
                        "gs:abc",
                        "Fetal heart rate monitoring via machine learning",
                        55,
                    )],
                    stats: Some(stats(1100, 17, 22, 1)),
                    ..Default::default()
                },
            ),
        ]);
        let profile = build_profile(&record(), &raw);
        assert_eq!(profile.publications.len(), 1);
        assert_eq!(profile.publications[0].reuse, Reuse::Publication { citations: 55 });
        assert_eq!(profile.stats.i10_index, 22);
        assert!((profile.s_index - 73.4).abs() < 0.05);
    }

    #[test]
    fn repositories_are_ranked_by_score() {
        let raw = raw(vec![(
            SourceKind::GitHub,
            SourceData {
                artifacts: vec![repo("gh:jane/small", 1), repo("gh:jane/big", 500)],
                ..Default::default()
            },
        )]);
        let profile = build_profile(&record(), &raw);
        let ids: Vec<&str> = profile
            .repositories
            .iter()
            .map(|r| r.primary_identifier())
            .collect();
        assert_eq!(ids, ["gh:jane/big", "gh:jane/small"]);
        assert!(profile.artifact_score(&profile.repositories[0]).is_some());
        let expected = profile.scores.paper_impact + profile.scores.artifact_total;
        assert_eq!(profile.s_index, expected);
    }

    #[test]
    fn duplicate_repositories_are_counted_once() {
        let merged = dedup_repositories(vec![repo("gh:jane/a", 3), repo("gh:jane/a", 9)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].reuse.total(), 9);
    }

    #[test]
    fn affiliations_are_deduplicated() {
        let aff = |name: &str, current: bool| Affiliation {
            institution: name.into(),
            city: "Montreal".into(),
            country: "CA".into(),
            current,
        };
        let out = dedup_affiliations(vec![
            aff("University of Montreal", false),
            aff("university of  montreal", true),
            aff("McGill University", false),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|a| a.current && a.institution == "university of  montreal"));
    }

    #[test]
    fn empty_profile_has_zero_score() {
        let profile = ResearcherProfile::empty(&record());
        assert!(profile.publications.is_empty());
        assert_eq!(profile.s_index, 0.0);
        assert_eq!(profile.connected_sources(), 0);
        assert!(!profile.is_stale());
    }
}
