//! GitHub: the code-host index.
//!
//! Lists a user's public, non-fork repositories and keeps the most-starred.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AggregateConfig;
use crate::error::{SourceError, TwinError};
use crate::http;
use crate::source::{send_json, SourceClient};
use crate::types::{Artifact, Reuse, SourceData, SourceKind};

/// Repositories kept after sorting by stars.
const TOP_REPOS: usize = 15;

#[derive(Debug, Deserialize)]
struct GhRepo {
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    updated_at: Option<String>,
}

/// GitHub REST API client.
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// # Errors
    ///
    /// Returns [`TwinError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AggregateConfig) -> Result<Self, TwinError> {
        Ok(Self::new(
            http::build_api_client(config)?,
            config.endpoints.github.clone(),
            config.github_token.clone(),
        ))
    }
}

#[async_trait]
impl SourceClient for GitHubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GitHub
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError> {
        if !is_valid_username(identifier) {
            return Err(SourceError::Permanent("invalid GitHub username".into()));
        }
        tracing::debug!(user = identifier, "GitHub fetch");

        let mut request = self
            .client
            .get(format!("{}/users/{identifier}/repos", self.base_url))
            .query(&[("sort", "updated"), ("per_page", "100")])
            .header("Accept", "application/vnd.github+json");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let repos: Vec<GhRepo> = send_json(request, "GitHub repos").await?;
        Ok(normalize(identifier, repos))
    }
}

/// GitHub usernames: 1-39 alphanumerics or single hyphens, no leading or
/// trailing hyphen.
fn is_valid_username(name: &str) -> bool {
    (1..=39).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

fn normalize(username: &str, repos: Vec<GhRepo>) -> SourceData {
    let mut artifacts: Vec<Artifact> = repos
        .into_iter()
        .filter(|r| !r.fork)
        .map(|repo| {
            let mut artifact = Artifact::new(
                SourceKind::GitHub,
                format!("gh:{}", repo.full_name.to_lowercase()),
                repo.name,
                Reuse::Repository {
                    stars: repo.stargazers_count,
                    forks: repo.forks_count,
                },
            );
            artifact.authors = vec![username.to_string()];
            artifact.is_public = !repo.private;
            artifact.has_license = repo.license.is_some_and(|l| !l.is_null());
            // The listing does not expose README presence; public repos are
            // assumed documented.
            artifact.has_documentation = !repo.private;
            artifact.structured_format = repo.language.is_some();
            artifact.item_type = repo.language;
            artifact.description = repo.description.filter(|d| !d.is_empty());
            artifact.url = repo.html_url;
            artifact.year = repo
                .updated_at
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok());
            artifact
        })
        .collect();

    artifacts.sort_by(|a, b| {
        b.reuse
            .total()
            .cmp(&a.reuse.total())
            .then_with(|| a.primary_identifier().cmp(b.primary_identifier()))
    });
    artifacts.truncate(TOP_REPOS);

    SourceData {
        artifacts,
        stats: None,
        affiliations: Vec::new(),
    }
}
