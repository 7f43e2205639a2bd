//! Shared HTTP client construction for source requests.
//!
//! JSON APIs get a client identifying this crate; the scraped profile source
//! gets a browser-like client with a rotating User-Agent, mirroring what a
//! visitor's browser would send.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::config::AggregateConfig;
use crate::error::TwinError;

/// User-Agent sent to JSON APIs when none is configured.
const API_USER_AGENT: &str = concat!("researchtwin/", env!("CARGO_PKG_VERSION"));

/// Realistic browser User-Agent strings, rotated per scraped request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for JSON API sources.
///
/// # Errors
///
/// Returns [`TwinError::Http`] if the client cannot be constructed.
pub fn build_api_client(config: &AggregateConfig) -> Result<reqwest::Client, TwinError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| API_USER_AGENT.to_owned());
    build(config, ua)
}

/// Build a [`reqwest::Client`] for scraped HTML sources.
///
/// Uses the configured User-Agent, or a random browser one from the built-in
/// rotation list.
///
/// # Errors
///
/// Returns [`TwinError::Http`] if the client cannot be constructed.
pub fn build_scrape_client(config: &AggregateConfig) -> Result<reqwest::Client, TwinError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };
    build(config, ua)
}

fn build(config: &AggregateConfig, user_agent: String) -> Result<reqwest::Client, TwinError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| TwinError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array; choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
        assert!(ua.contains("Mozilla/5.0"));
    }

    #[test]
    fn api_user_agent_names_the_crate() {
        assert!(API_USER_AGENT.starts_with("researchtwin/"));
    }

    #[test]
    fn build_clients_with_default_config() {
        let config = AggregateConfig::default();
        assert!(build_api_client(&config).is_ok());
        assert!(build_scrape_client(&config).is_ok());
    }

    #[test]
    fn build_client_with_custom_ua() {
        let config = AggregateConfig {
            user_agent: Some("CustomBot/1.0".into()),
            ..Default::default()
        };
        assert!(build_api_client(&config).is_ok());
    }
}
