//! Figshare: the dataset-repository index.
//!
//! There is no author-id lookup, so articles are found by a paginated
//! full-text search on the researcher's name, then each hit's detail record
//! is fetched and kept only if one of its authors matches that name.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::AggregateConfig;
use crate::error::{SourceError, TwinError};
use crate::http;
use crate::source::{send_json, truncate_chars, SourceClient};
use crate::types::{Artifact, Reuse, SourceData, SourceKind};

const PAGE_SIZE: usize = 50;
/// Upper bound on search pages walked per researcher.
const MAX_PAGES: u32 = 10;
const MAX_DESCRIPTION_CHARS: usize = 500;
/// Descriptions longer than this count as documentation.
const DOCUMENTED_DESCRIPTION_CHARS: usize = 50;
/// Item types that are structured, machine-readable formats.
const STRUCTURED_TYPES: &[&str] = &["dataset", "software", "code"];

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ArticleDetail {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    views: u64,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    license: Option<NamedRef>,
    #[serde(default)]
    authors: Vec<ArticleAuthor>,
    #[serde(default)]
    categories: Vec<NamedRef>,
    #[serde(default)]
    defined_type_name: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    url_public_html: Option<String>,
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ArticleAuthor {
    #[serde(default)]
    full_name: Option<String>,
}

/// `license` and `categories` entries; only the display name is used.
#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default, alias = "title")]
    name: Option<String>,
}

/// Figshare v2 API client.
pub struct FigshareSource {
    client: reqwest::Client,
    base_url: String,
    request_delay: Duration,
}

impl FigshareSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, request_delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_delay,
        }
    }

    /// # Errors
    ///
    /// Returns [`TwinError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AggregateConfig) -> Result<Self, TwinError> {
        Ok(Self::new(
            http::build_api_client(config)?,
            config.endpoints.figshare.clone(),
            Duration::from_millis(config.figshare_request_delay_ms),
        ))
    }

    async fn search_page(&self, name: &str, page: u32) -> Result<Vec<SearchHit>, SourceError> {
        send_json(
            self.client
                .post(format!("{}/articles/search", self.base_url))
                .json(&json!({
                    "search_for": name,
                    "page": page,
                    "page_size": PAGE_SIZE,
                })),
            "Figshare search",
        )
        .await
    }

    async fn detail(&self, id: u64) -> Result<ArticleDetail, SourceError> {
        send_json(
            self.client.get(format!("{}/articles/{id}", self.base_url)),
            "Figshare article",
        )
        .await
    }
}

#[async_trait]
impl SourceClient for FigshareSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Figshare
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError> {
        let Some(name) = SearchName::parse(identifier) else {
            return Err(SourceError::Permanent(
                "Figshare search name needs a first and last name".into(),
            ));
        };
        tracing::debug!(name = identifier, "Figshare fetch");

        let mut artifacts = Vec::new();
        for page in 1..=MAX_PAGES {
            let hits = self.search_page(identifier, page).await?;
            let last_page = hits.len() < PAGE_SIZE;

            for hit in hits {
                // A transient detail failure fails the whole fetch so a
                // partial article set is never cached as complete.
                let detail = match self.detail(hit.id).await {
                    Ok(d) => d,
                    Err(e) if e.is_transient() => return Err(e),
                    Err(e) => {
                        tracing::debug!(article = hit.id, error = %e, "skipping Figshare article");
                        continue;
                    }
                };
                if name.matches_any(&detail.authors) {
                    artifacts.push(detail_to_artifact(detail));
                }
                if !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }
            }

            if last_page {
                break;
            }
        }

        artifacts.sort_by(|a, b| a.primary_identifier().cmp(b.primary_identifier()));
        artifacts.dedup_by(|a, b| a.identifiers == b.identifiers);

        Ok(SourceData {
            artifacts,
            stats: None,
            affiliations: Vec::new(),
        })
    }
}

/// First and last name tokens of the search name, lower-cased.
struct SearchName {
    first: String,
    last: String,
}

impl SearchName {
    fn parse(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        let parts: Vec<&str> = lower.split_whitespace().collect();
        if parts.len() < 2 {
            return None;
        }
        Some(Self {
            first: parts[0].to_string(),
            last: parts[parts.len() - 1].to_string(),
        })
    }

    /// "Martin Frasch" matches "Martin G. Frasch".
    fn matches_any(&self, authors: &[ArticleAuthor]) -> bool {
        authors.iter().any(|a| {
            let full = a.full_name.as_deref().unwrap_or_default().to_lowercase();
            full.contains(&self.first) && full.contains(&self.last)
        })
    }
}

fn detail_to_artifact(detail: ArticleDetail) -> Artifact {
    let mut artifact = Artifact::new(
        SourceKind::Figshare,
        format!("figshare:{}", detail.id),
        detail.title.unwrap_or_default().trim(),
        Reuse::Dataset {
            downloads: detail.downloads,
            views: detail.views,
        },
    );

    let doi = detail.doi.filter(|d| !d.trim().is_empty());
    if let Some(ref doi) = doi {
        artifact.identifiers.insert(format!("doi:{}", doi.to_lowercase()));
    }
    artifact.persistent_id = doi;

    let description = detail
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let description_len = description.as_deref().map_or(0, |d| d.chars().count());
    let item_type = detail
        .defined_type_name
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());
    let has_categories = detail
        .categories
        .iter()
        .any(|c| c.name.as_deref().is_some_and(|n| !n.is_empty()));

    // Only published articles are returned by the public API.
    artifact.is_public = true;
    artifact.has_license = detail
        .license
        .and_then(|l| l.name)
        .is_some_and(|n| !n.trim().is_empty());
    artifact.has_documentation =
        description_len > DOCUMENTED_DESCRIPTION_CHARS || detail.files.len() > 1;
    artifact.structured_format = has_categories
        || item_type
            .as_deref()
            .is_some_and(|t| STRUCTURED_TYPES.contains(&t));
    artifact.authors = detail
        .authors
        .into_iter()
        .filter_map(|a| a.full_name)
        .filter(|n| !n.trim().is_empty())
        .collect();
    artifact.item_type = item_type;
    artifact.description = description.map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS));
    artifact.url = detail.url_public_html.filter(|u| !u.is_empty());
    artifact.year = detail
        .created_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> FigshareSource {
        FigshareSource::new(reqwest::Client::new(), server.uri(), Duration::ZERO)
    }

    #[test]
    fn search_name_needs_two_tokens() {
        assert!(SearchName::parse("Frasch").is_none());
        assert!(SearchName::parse("  ").is_none());
        assert!(SearchName::parse("Martin Frasch").is_some());
    }

    #[test]
    fn author_match_tolerates_middle_names() {
        let name = SearchName::parse("Martin Frasch").expect("name");
        let author = |n: &str| ArticleAuthor {
            full_name: Some(n.to_string()),
        };
        assert!(name.matches_any(&[author("Martin G. Frasch")]));
        assert!(name.matches_any(&[author("A Lee"), author("MARTIN GERBERT FRASCH")]));
        assert!(!name.matches_any(&[author("Martin Smith")]));
        assert!(!name.matches_any(&[]));
    }

    #[test]
    fn flags_follow_metadata() {
        let detail: ArticleDetail = serde_json::from_value(json!({
            "id": 7,
            "title": " Fetal ECG dataset ",
            "doi": "10.6084/M9.FIGSHARE.7",
            "description": "Raw abdominal ECG recordings from 40 pregnancies with annotated fetal QRS.",
            "views": 500,
            "downloads": 300,
            "license": {"value": 1, "name": "CC BY 4.0"},
            "authors": [{"full_name": "Jane Doe"}, {"full_name": ""}],
            "categories": [],
            "defined_type_name": "Dataset",
            "created_date": "2020-03-01T00:00:00Z",
            "files": [{"id": 1}]
        }))
        .expect("detail");

        let artifact = detail_to_artifact(detail);
        assert_eq!(artifact.title, "Fetal ECG dataset");
        assert!(artifact.identifiers.contains("figshare:7"));
        assert!(artifact.identifiers.contains("doi:10.6084/m9.figshare.7"));
        assert_eq!(artifact.reuse.total(), 800);
        assert!(artifact.is_public && artifact.has_license);
        assert!(artifact.has_documentation);
        assert!(artifact.structured_format);
        assert_eq!(artifact.authors, vec!["Jane Doe"]);
        assert_eq!(artifact.item_type.as_deref(), Some("dataset"));
        assert_eq!(artifact.year, Some(2020));
    }

    #[test]
    fn bare_figure_has_no_bonus_flags() {
        let detail: ArticleDetail = serde_json::from_value(json!({
            "id": 8,
            "title": "Figure 2 from: Something",
            "description": "short",
            "defined_type_name": "figure",
            "files": [{"id": 1}]
        }))
        .expect("detail");

        let artifact = detail_to_artifact(detail);
        assert!(!artifact.has_license);
        assert!(!artifact.has_documentation);
        assert!(!artifact.structured_format);
        assert!(artifact.persistent_id.is_none());
    }

    #[tokio::test]
    async fn fetch_filters_by_author_and_skips_missing_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/articles/search"))
            .and(body_partial_json(json!({"search_for": "Jane Doe", "page": 1})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}, {"id": 3}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "title": "Fetal ECG dataset",
                "views": 10,
                "downloads": 5,
                "authors": [{"full_name": "Jane Q. Doe"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 2,
                "title": "Someone else's data",
                "authors": [{"full_name": "John Roe"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let data = source_for(&server).fetch("Jane Doe").await.expect("fetch");
        assert_eq!(data.artifacts.len(), 1);
        assert_eq!(data.artifacts[0].title, "Fetal ECG dataset");
        assert!(data.stats.is_none());
    }

    #[tokio::test]
    async fn transient_detail_failure_fails_the_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/articles/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "title": "Fetal ECG dataset",
                "authors": [{"full_name": "Jane Doe"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch("Jane Doe").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn failed_search_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/articles/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch("Jane Doe").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn single_token_name_is_permanent() {
        let source = FigshareSource::new(reqwest::Client::new(), "http://localhost", Duration::ZERO);
        let err = source.fetch("Doe").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
