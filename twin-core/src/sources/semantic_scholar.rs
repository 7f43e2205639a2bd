//! Semantic Scholar: the primary publication index.
//!
//! Two JSON calls per researcher: the author record for aggregate statistics
//! and the author's papers ordered by citation count.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AggregateConfig;
use crate::error::{SourceError, TwinError};
use crate::http;
use crate::source::{send_json, SourceClient};
use crate::types::{Artifact, PublicationStats, Reuse, SourceData, SourceKind};

const AUTHOR_FIELDS: &str = "name,paperCount,citationCount,hIndex";
const PAPER_FIELDS: &str = "title,year,citationCount,url,venue,externalIds,authors";
/// Papers requested per author.
const PAPER_LIMIT: &str = "50";
/// Papers kept after sorting by citations.
const TOP_PAPERS: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Author {
    #[serde(default)]
    paper_count: Option<u64>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    h_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct S2PaperPage {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    year: Option<i32>,
    citation_count: Option<u64>,
    url: Option<String>,
    venue: Option<String>,
    #[serde(default)]
    external_ids: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    authors: Vec<S2AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct S2AuthorRef {
    name: Option<String>,
}

/// Semantic Scholar Graph API client.
pub struct SemanticScholarSource {
    client: reqwest::Client,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns [`TwinError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AggregateConfig) -> Result<Self, TwinError> {
        Ok(Self::new(
            http::build_api_client(config)?,
            config.endpoints.semantic_scholar.clone(),
        ))
    }
}

#[async_trait]
impl SourceClient for SemanticScholarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError> {
        if identifier.is_empty() || !identifier.chars().all(|c| c.is_ascii_digit()) {
            return Err(SourceError::Permanent(
                "Semantic Scholar author id must be numeric".into(),
            ));
        }
        tracing::debug!(author = identifier, "Semantic Scholar fetch");

        let author: S2Author = send_json(
            self.client
                .get(format!("{}/author/{identifier}", self.base_url))
                .query(&[("fields", AUTHOR_FIELDS)]),
            "Semantic Scholar author",
        )
        .await?;

        let page: S2PaperPage = send_json(
            self.client
                .get(format!("{}/author/{identifier}/papers", self.base_url))
                .query(&[
                    ("fields", PAPER_FIELDS),
                    ("limit", PAPER_LIMIT),
                    ("sort", "citationCount:desc"),
                ]),
            "Semantic Scholar papers",
        )
        .await?;

        Ok(normalize(author, page))
    }
}

fn normalize(author: S2Author, page: S2PaperPage) -> SourceData {
    let mut artifacts: Vec<Artifact> = page.data.into_iter().filter_map(paper_to_artifact).collect();
    artifacts.sort_by(|a, b| {
        b.reuse
            .total()
            .cmp(&a.reuse.total())
            .then_with(|| a.primary_identifier().cmp(b.primary_identifier()))
    });
    artifacts.truncate(TOP_PAPERS);

    let stats = PublicationStats {
        paper_count: author.paper_count.unwrap_or(0),
        citation_count: author.citation_count.unwrap_or(0),
        h_index: author.h_index.unwrap_or(0),
        // Not reported by this index; the secondary publication source supplies it.
        i10_index: 0,
    };

    SourceData {
        artifacts,
        stats: Some(stats),
        affiliations: Vec::new(),
    }
}

fn paper_to_artifact(paper: S2Paper) -> Option<Artifact> {
    let paper_id = paper.paper_id.filter(|id| !id.is_empty())?;
    let title = paper.title.unwrap_or_default();
    let mut artifact = Artifact::new(
        SourceKind::SemanticScholar,
        format!("s2:{paper_id}"),
        title.trim(),
        Reuse::Publication {
            citations: paper.citation_count.unwrap_or(0),
        },
    );

    let doi = paper
        .external_ids
        .as_ref()
        .and_then(|ids| ids.get("DOI"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    if let Some(ref doi) = doi {
        artifact.identifiers.insert(format!("doi:{}", doi.to_lowercase()));
    }
    artifact.persistent_id = doi;
    artifact.authors = paper.authors.into_iter().filter_map(|a| a.name).collect();
    artifact.year = paper.year;
    artifact.venue = paper.venue.filter(|v| !v.trim().is_empty());
    artifact.url = paper.url.filter(|u| !u.is_empty());
    Some(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> SemanticScholarSource {
        SemanticScholarSource::new(reqwest::Client::new(), server.uri())
    }

    #[test]
    fn kind_is_semantic_scholar() {
        let source = SemanticScholarSource::new(reqwest::Client::new(), "http://localhost");
        assert_eq!(source.kind(), SourceKind::SemanticScholar);
    }

    #[tokio::test]
    async fn non_numeric_id_is_permanent() {
        let source = SemanticScholarSource::new(reqwest::Client::new(), "http://localhost");
        let err = source.fetch("abc").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn fetch_normalizes_author_and_papers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/author/4019392"))
            .and(query_param("fields", AUTHOR_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorId": "4019392",
                "name": "Jane Doe",
                "paperCount": 120,
                "citationCount": 1200,
                "hIndex": 18
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/author/4019392/papers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "paperId": "p1",
                        "title": "Fetal Heart Rate Monitoring via Machine Learning",
                        "year": 2021,
                        "citationCount": 40,
                        "venue": "Physiol Meas",
                        "externalIds": {"DOI": "10.1000/ABC", "CorpusId": 123},
                        "authors": [{"name": "Jane Doe"}, {"name": "Ann Lee"}]
                    },
                    {
                        "paperId": "p2",
                        "title": "Sleep states in the fetus",
                        "citationCount": 90,
                        "authors": []
                    },
                    {
                        "paperId": null,
                        "title": "No id, dropped"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let data = source_for(&server).fetch("4019392").await.expect("fetch");
        let stats = data.stats.expect("stats");
        assert_eq!(stats.h_index, 18);
        assert_eq!(stats.citation_count, 1200);
        assert_eq!(stats.paper_count, 120);

        assert_eq!(data.artifacts.len(), 2);
        // Sorted by citations, highest first.
        assert_eq!(data.artifacts[0].title, "Sleep states in the fetus");
        let ml = &data.artifacts[1];
        assert!(ml.identifiers.contains("s2:p1"));
        assert!(ml.identifiers.contains("doi:10.1000/abc"));
        assert_eq!(ml.persistent_id.as_deref(), Some("10.1000/ABC"));
        assert_eq!(ml.authors, vec!["Jane Doe", "Ann Lee"]);
        assert_eq!(ml.venue.as_deref(), Some("Physiol Meas"));
    }

    #[tokio::test]
    async fn throttled_response_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/author/1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch("1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unknown_author_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/author/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch("2").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
