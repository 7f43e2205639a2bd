//! Google Scholar: the secondary, overlapping publication index.
//!
//! There is no API; the public citations profile page is scraped with CSS
//! selectors. Bot-detection pages are reported as transient so that the
//! orchestrator falls back to the (48h) cached copy.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::config::AggregateConfig;
use crate::error::{SourceError, TwinError};
use crate::http;
use crate::source::{send_text, SourceClient};
use crate::types::{Artifact, PublicationStats, Reuse, SourceData, SourceKind};

/// Publication rows requested per profile page.
const PAGE_SIZE: &str = "100";

/// Google Scholar citations-profile scraper.
pub struct GoogleScholarSource {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleScholarSource {
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
            http::build_scrape_client(config)?,
            config.endpoints.google_scholar.clone(),
        ))
    }
}

#[async_trait]
impl SourceClient for GoogleScholarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GoogleScholar
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceData, SourceError> {
        if !is_valid_profile_id(identifier) {
            return Err(SourceError::Permanent(
                "Google Scholar id must be 1-20 alphanumeric characters".into(),
            ));
        }
        tracing::debug!(profile = identifier, "Google Scholar fetch");

        let html = send_text(
            self.client
                .get(format!("{}/citations", self.base_url))
                .query(&[
                    ("user", identifier),
                    ("hl", "en"),
                    ("cstart", "0"),
                    ("pagesize", PAGE_SIZE),
                ])
                .header("Accept", "text/html,application/xhtml+xml")
                .header("Accept-Language", "en-US,en;q=0.9"),
            "Google Scholar profile",
        )
        .await?;

        tracing::trace!(bytes = html.len(), "Google Scholar response received");
        parse_profile_html(&html)
    }
}

fn is_valid_profile_id(id: &str) -> bool {
    (1..=20).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css)
        .map_err(|e| SourceError::Permanent(format!("invalid selector {css}: {e:?}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse a citations profile page.
///
/// Extracted as a separate function for testability with fixture HTML.
fn parse_profile_html(html: &str) -> Result<SourceData, SourceError> {
    let document = Html::parse_document(html);

    let name_sel = selector("#gsc_prf_in")?;
    if document.select(&name_sel).next().is_none() {
        let captcha_sel = selector("#gs_captcha_ccl, #captcha-form")?;
        if document.select(&captcha_sel).next().is_some() || html.contains("unusual traffic") {
            return Err(SourceError::Transient(
                "Google Scholar served a bot-detection page".into(),
            ));
        }
        return Err(SourceError::Permanent(
            "Google Scholar profile not found".into(),
        ));
    }

    let mut stats = parse_stats(&document)?;

    let row_sel = selector("tr.gsc_a_tr")?;
    let title_sel = selector("a.gsc_a_at")?;
    let cites_sel = selector("td.gsc_a_c a, td.gsc_a_c .gsc_a_ac")?;
    let year_sel = selector("td.gsc_a_y span")?;
    let gray_sel = selector("div.gs_gray")?;

    let mut artifacts = Vec::new();
    for row in document.select(&row_sel) {
        let Some(title_el) = row.select(&title_sel).next() else {
            continue;
        };
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }

        let Some(citation_id) = title_el
            .value()
            .attr("href")
            .and_then(citation_id_from_href)
        else {
            continue;
        };

        let citations = row
            .select(&cites_sel)
            .next()
            .map(element_text)
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(0);
        let year = row
            .select(&year_sel)
            .next()
            .map(element_text)
            .and_then(|t| t.parse::<i32>().ok());

        let mut gray = row.select(&gray_sel).map(element_text);
        let authors: Vec<String> = gray
            .next()
            .map(|line| {
                line.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty() && *a != "...")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let venue = gray.next().filter(|v| !v.is_empty());

        let mut artifact = Artifact::new(
            SourceKind::GoogleScholar,
            format!("gs:{citation_id}"),
            title,
            Reuse::Publication { citations },
        );
        artifact.authors = authors;
        artifact.year = year;
        artifact.venue = venue;
        artifacts.push(artifact);
    }

    stats.paper_count = artifacts.len() as u64;
    Ok(SourceData {
        artifacts,
        stats: Some(stats),
        affiliations: Vec::new(),
    })
}

/// Read the "All" column of the citation indices table.
fn parse_stats(document: &Html) -> Result<PublicationStats, SourceError> {
    let row_sel = selector("#gsc_rsb_st tbody tr")?;
    let label_sel = selector("td.gsc_rsb_sc1")?;
    let value_sel = selector("td.gsc_rsb_std")?;

    let mut stats = PublicationStats::default();
    for row in document.select(&row_sel) {
        let label = row
            .select(&label_sel)
            .next()
            .map(element_text)
            .unwrap_or_default()
            .to_lowercase();
        let value = row
            .select(&value_sel)
            .next()
            .map(element_text)
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(0);
        if label.starts_with("citations") {
            stats.citation_count = value;
        } else if label.starts_with("h-index") {
            stats.h_index = u32::try_from(value).unwrap_or(u32::MAX);
        } else if label.starts_with("i10-index") {
            stats.i10_index = u32::try_from(value).unwrap_or(u32::MAX);
        }
    }
    Ok(stats)
}

/// Extract the `citation_for_view` parameter from a row link.
fn citation_id_from_href(href: &str) -> Option<String> {
    let query = href.split_once('?').map_or(href, |(_, q)| q);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "citation_for_view")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
