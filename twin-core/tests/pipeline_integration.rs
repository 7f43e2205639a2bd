//! Integration tests for the aggregation pipeline.
//!
//! These tests exercise fetch → merge → group → score → context using mock
//! source clients (no network calls). Live source tests are marked
//! `#[ignore]` for manual/periodic validation.

use std::sync::Arc;

use async_trait::async_trait;
use twin_core::orchestrator::dedup::{group_dataset_fragments, merge_publications};
use twin_core::{
    aggregate_profile, build_context, AggregateConfig, Artifact, ContextLimits, MemoryCacheStore,
    Orchestrator, PublicationStats, ResearcherRecord, Reuse, SourceClient, SourceData,
    SourceError, SourceKind, SourceStatus,
};

/// Mock source returning a fixed payload or a fixed error.
struct StaticSource {
    kind: SourceKind,
    result: Result<SourceData, SourceError>,
}

#[async_trait]
impl SourceClient for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _identifier: &str) -> Result<SourceData, SourceError> {
        self.result.clone()
    }
}

fn source(kind: SourceKind, result: Result<SourceData, SourceError>) -> Arc<dyn SourceClient> {
    Arc::new(StaticSource { kind, result })
}

fn paper(source: SourceKind, id: &str, title: &str, cites: u64) -> Artifact {
    Artifact::new(source, id, title, Reuse::Publication { citations: cites })
}

fn fair_dataset(id: &str, title: &str, downloads: u64, views: u64) -> Artifact {
    let mut a = Artifact::new(SourceKind::Figshare, id, title, Reuse::Dataset { downloads, views });
    a.is_public = true;
    a.has_license = true;
    a.persistent_id = Some(format!("10.6084/{id}"));
    a.has_documentation = true;
    a.structured_format = true;
    a.authors = vec!["Jane Doe".into(), "Ann Lee".into(), "Bo Chen".into()];
    a.institutions = ["Uni X".to_string(), "Uni Y".to_string()].into();
    a.item_type = Some("dataset".into());
    a
}

fn repo(name: &str, stars: u64, forks: u64) -> Artifact {
    let mut a = Artifact::new(
        SourceKind::GitHub,
        format!("gh:janedoe/{name}"),
        name,
        Reuse::Repository { stars, forks },
    );
    a.is_public = true;
    a.has_license = true;
    a.has_documentation = true;
    a.structured_format = true;
    a.authors = vec!["janedoe".into()];
    a
}

fn semantic_scholar_data() -> SourceData {
    SourceData {
        artifacts: vec![
            paper(SourceKind::SemanticScholar, "s2:a", "Fetal Heart Rate Monitoring via ML", 120),
            paper(SourceKind::SemanticScholar, "s2:b", "Sheep models of maternal inflammation", 40),
        ],
        stats: Some(PublicationStats {
            paper_count: 2,
            citation_count: 1200,
            h_index: 18,
            i10_index: 0,
        }),
        affiliations: Vec::new(),
    }
}

fn google_scholar_data() -> SourceData {
    SourceData {
        artifacts: vec![
            paper(
                SourceKind::GoogleScholar,
                "gs:x1",
                "Fetal heart rate monitoring via machine learning",
                131,
            ),
            paper(SourceKind::GoogleScholar, "gs:x2", "A conference abstract on HRV", 2),
        ],
        stats: Some(PublicationStats {
            paper_count: 2,
            citation_count: 1180,
            h_index: 17,
            i10_index: 25,
        }),
        affiliations: Vec::new(),
    }
}

fn figshare_data() -> SourceData {
    SourceData {
        artifacts: vec![
            fair_dataset("figshare:1", "Fetal ECG recordings", 300, 500),
            fair_dataset("figshare:2", "Figure 1 from Fetal ECG recordings", 20, 30),
            fair_dataset("figshare:3", "Supplementary Table 2 from Fetal ECG recordings", 900, 10),
        ],
        ..Default::default()
    }
}

fn github_data() -> SourceData {
    SourceData {
        artifacts: vec![repo("fetal-hrv", 30, 10), repo("dotfiles", 0, 0)],
        ..Default::default()
    }
}

fn jane() -> ResearcherRecord {
    ResearcherRecord::new("jane-doe", "Jane Doe")
        .with_identifier(SourceKind::SemanticScholar, "12345")
        .with_identifier(SourceKind::GoogleScholar, "AbCdEf")
        .with_identifier(SourceKind::GitHub, "janedoe")
        .with_identifier(SourceKind::Figshare, "Jane Doe")
}

fn four_sources() -> Vec<SourceKind> {
    vec![
        SourceKind::SemanticScholar,
        SourceKind::GoogleScholar,
        SourceKind::GitHub,
        SourceKind::Figshare,
    ]
}

fn config() -> AggregateConfig {
    AggregateConfig {
        sources: four_sources(),
        aggregate_timeout_secs: 5,
        ..Default::default()
    }
}

fn healthy_clients() -> Vec<Arc<dyn SourceClient>> {
    vec![
        source(SourceKind::SemanticScholar, Ok(semantic_scholar_data())),
        source(SourceKind::GoogleScholar, Ok(google_scholar_data())),
        source(SourceKind::GitHub, Ok(github_data())),
        source(SourceKind::Figshare, Ok(figshare_data())),
    ]
}

#[tokio::test]
async fn full_pipeline_merges_groups_and_scores() {
    let orchestrator = Orchestrator::new(
        &config(),
        healthy_clients(),
        Arc::new(MemoryCacheStore::default()),
    );
    let profile = aggregate_profile(&orchestrator, &jane()).await;

    // The abbreviation pair merges; the other two papers stay standalone.
    assert_eq!(profile.publications.len(), 3);
    let merged = &profile.publications[0];
    assert_eq!(merged.title, "Fetal Heart Rate Monitoring via ML");
    assert_eq!(merged.reuse, Reuse::Publication { citations: 131 });
    assert!(merged.identifiers.contains("s2:a"));
    assert!(merged.identifiers.contains("gs:x1"));

    // Figure and table fragments collapse into one representative: the
    // table has the most downloads + views, and counts are not summed.
    assert_eq!(profile.datasets.len(), 1);
    assert_eq!(profile.datasets[0].primary_identifier(), "figshare:3");
    assert_eq!(profile.datasets[0].reuse.total(), 910);

    assert_eq!(profile.stats.citation_count, 1200);
    assert_eq!(profile.stats.h_index, 18);
    assert_eq!(profile.stats.i10_index, 25);
    assert_eq!(profile.stats.paper_count, 3);

    let expected = profile.scores.paper_impact + profile.scores.artifact_total;
    assert!((profile.s_index - expected).abs() < 1e-9);
    assert!((profile.scores.paper_impact - 73.4).abs() < 0.05);
    assert!(profile.sources.values().all(|r| r.status == SourceStatus::Connected));
}

#[tokio::test]
async fn one_permanent_failure_of_four_keeps_the_rest() {
    let clients = vec![
        source(SourceKind::SemanticScholar, Ok(semantic_scholar_data())),
        source(
            SourceKind::GoogleScholar,
            Err(SourceError::Permanent("HTTP 404".into())),
        ),
        source(SourceKind::GitHub, Ok(github_data())),
        source(SourceKind::Figshare, Ok(figshare_data())),
    ];
    let orchestrator = Orchestrator::new(&config(), clients, Arc::new(MemoryCacheStore::default()));
    let profile = aggregate_profile(&orchestrator, &jane()).await;

    assert_eq!(
        profile.sources[&SourceKind::GoogleScholar].status,
        SourceStatus::Unavailable
    );
    assert_eq!(profile.connected_sources(), 3);
    assert_eq!(profile.publications.len(), 2);
    assert_eq!(profile.repositories.len(), 2);
    assert_eq!(profile.datasets.len(), 1);
}

#[tokio::test]
async fn total_failure_yields_empty_profile_not_error() {
    let clients: Vec<Arc<dyn SourceClient>> = four_sources()
        .into_iter()
        .map(|k| source(k, Err(SourceError::Transient("connection refused".into()))))
        .collect();
    let orchestrator = Orchestrator::new(&config(), clients, Arc::new(MemoryCacheStore::default()));
    let profile = aggregate_profile(&orchestrator, &jane()).await;

    assert_eq!(profile.sources.len(), 4);
    assert!(profile
        .sources
        .values()
        .all(|r| r.status == SourceStatus::Unavailable));
    assert!(profile.publications.is_empty());
    assert!(profile.datasets.is_empty());
    assert!(profile.repositories.is_empty());
    assert_eq!(profile.s_index, 0.0);
}

#[tokio::test]
async fn profile_is_identical_across_runs_and_orderings() {
    let forward = Orchestrator::new(&config(), healthy_clients(), Arc::new(MemoryCacheStore::default()));
    let mut reversed_clients = healthy_clients();
    reversed_clients.reverse();
    let reversed = Orchestrator::new(&config(), reversed_clients, Arc::new(MemoryCacheStore::default()));

    let a = aggregate_profile(&forward, &jane()).await;
    let b = aggregate_profile(&reversed, &jane()).await;
    let c = aggregate_profile(&forward, &jane()).await;

    assert_eq!(a.publications, b.publications);
    assert_eq!(a.datasets, b.datasets);
    assert_eq!(a.repositories, b.repositories);
    assert_eq!(a.scores, b.scores);
    assert_eq!(a.s_index.to_bits(), b.s_index.to_bits());
    assert_eq!(a.s_index.to_bits(), c.s_index.to_bits());
}

#[test]
fn dedup_is_idempotent_on_pipeline_data() {
    let mut publications = semantic_scholar_data().artifacts;
    publications.extend(google_scholar_data().artifacts);
    let once = merge_publications(publications);
    let twice = merge_publications(once.clone());
    assert_eq!(once, twice);

    let grouped = group_dataset_fragments(figshare_data().artifacts);
    let regrouped = group_dataset_fragments(grouped.clone());
    assert_eq!(grouped, regrouped);
}

#[tokio::test]
async fn context_payload_is_bounded_and_keeps_stats() {
    let orchestrator = Orchestrator::new(&config(), healthy_clients(), Arc::new(MemoryCacheStore::default()));
    let profile = aggregate_profile(&orchestrator, &jane()).await;
    let limits = ContextLimits {
        max_per_category: 1,
        max_description_chars: 50,
    };
    let ctx = build_context(&profile, &limits);

    assert_eq!(ctx.publications.len(), 1);
    assert_eq!(ctx.omitted.publications, 2);
    assert_eq!(ctx.repositories.len(), 1);
    assert_eq!(ctx.repositories[0].identifier, "gh:janedoe/fetal-hrv");
    assert_eq!(ctx.stats, profile.stats);

    let text = ctx.render_text();
    assert!(text.contains("Fetal Heart Rate Monitoring via ML"));
    assert!(text.contains("(2 more not shown)"));
}

// ── Live integration tests (require network) ──────────────────────────
// Run with: cargo test -p twin-core --test pipeline_integration live_ -- --ignored

#[tokio::test]
#[ignore]
async fn live_github_profile() {
    let config = AggregateConfig {
        sources: vec![SourceKind::GitHub],
        ..Default::default()
    };
    let orchestrator = match Orchestrator::from_config(&config, Arc::new(MemoryCacheStore::default())) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Client setup failed: {e}");
            return;
        }
    };
    let researcher =
        ResearcherRecord::new("octocat", "The Octocat").with_identifier(SourceKind::GitHub, "octocat");
    let profile = aggregate_profile(&orchestrator, &researcher).await;
    match profile.sources[&SourceKind::GitHub].status {
        SourceStatus::Connected => assert!(!profile.repositories.is_empty()),
        // Network failures are acceptable in CI; just log
        other => eprintln!("Live fetch not connected (acceptable in CI): {other:?}"),
    }
}
