//! Affiliations: ORCID public employment records.
//!
//! Yields no artifacts, only the researcher's institutions with location
//! and whether the position is current.

use async_trait::async_trait;
use serde::Deserialize;
use similar::TextDiff;

use crate::config::AggregateConfig;
use crate::error::{SourceError, TwinError};
use crate::http;
use crate::source::{send_json, SourceClient};
use crate::types::{Affiliation, SourceData, SourceKind};

/// Names more similar than this are the same institution
/// ("Universite de Montreal" vs "University of Montreal").
const SAME_INSTITUTION_RATIO: f32 = 0.8;

#[derive(Debug, Default, Deserialize)]
struct Employments {
    #[serde(default, rename = "affiliation-group")]
    groups: Vec<AffiliationGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct AffiliationGroup {
    #[serde(default)]
    summaries: Vec<SummaryWrapper>,
}

#[derive(Debug, Deserialize)]
struct SummaryWrapper {
    #[serde(rename = "employment-summary")]
    summary: Option<EmploymentSummary>,
}

#[derive(Debug, Deserialize)]
struct EmploymentSummary {
    organization: Option<Organization>,
    #[serde(default, rename = "end-date")]
    end_date: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// ORCID public API (v3.0) client.
pub struct AffiliationSource {
    client: reqwest::Client,
    base_url: String,
}

impl AffiliationSource {
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
            config.endpoints.orcid.clone(),
        ))
    }
}

#[async_trait]
impl SourceClient for AffiliationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Affiliations
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError> {
        if !is_valid_orcid(identifier) {
            return Err(SourceError::Permanent(
                "ORCID iD must look like 0000-0002-1825-0097".into(),
            ));
        }
        tracing::debug!(orcid = identifier, "ORCID employments fetch");

        let employments: Employments = send_json(
            self.client
                .get(format!("{}/{identifier}/employments", self.base_url))
                .header("Accept", "application/json"),
            "ORCID employments",
        )
        .await?;

        Ok(SourceData {
            affiliations: collect_affiliations(employments),
            ..Default::default()
        })
    }
}

/// Four dash-separated groups of four digits; the final check character may
/// be `X`.
fn is_valid_orcid(id: &str) -> bool {
    let groups: Vec<&str> = id.split('-').collect();
    groups.len() == 4
        && groups.iter().enumerate().all(|(i, g)| {
            g.len() == 4
                && g.chars().enumerate().all(|(j, c)| {
                    c.is_ascii_digit() || (i == 3 && j == 3 && c.eq_ignore_ascii_case(&'x'))
                })
        })
}

/// Case-fold and collapse whitespace.
pub fn normalize_institution(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two institution names refer to the same organisation.
pub fn same_institution(a: &str, b: &str) -> bool {
    let a = normalize_institution(a);
    let b = normalize_institution(b);
    a == b || TextDiff::from_chars(a.as_str(), b.as_str()).ratio() > SAME_INSTITUTION_RATIO
}

fn collect_affiliations(employments: Employments) -> Vec<Affiliation> {
    let mut out: Vec<Affiliation> = Vec::new();
    let summaries = employments
        .groups
        .into_iter()
        .flat_map(|g| g.summaries)
        .filter_map(|s| s.summary);

    for summary in summaries {
        let Some(org) = summary.organization else {
            continue;
        };
        let Some(name) = org.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
            continue;
        };
        // Records are newest first; a later duplicate is an older period at
        // the same institution.
        if out.iter().any(|a| same_institution(&a.institution, &name)) {
            continue;
        }

        let current = match summary.end_date {
            None | Some(serde_json::Value::Null) => true,
            Some(ref end) => end.get("year").map_or(true, serde_json::Value::is_null),
        };
        let address = org.address;
        out.push(Affiliation {
            institution: name,
            city: address
                .as_ref()
                .and_then(|a| a.city.clone())
                .unwrap_or_default(),
            country: address.and_then(|a| a.country).unwrap_or_default(),
            current,
        });
    }
    out
}
