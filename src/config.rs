//! Service configuration loaded from TOML.
//!
//! Every section has `#[serde(default)]`, so a partial file (or none at all)
//! yields a working configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use twin_core::AggregateConfig;

use crate::error::{Result, ServiceError};

/// Environment variable that overrides `aggregate.github_token`.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub aggregate: AggregateConfig,
    pub answer: AnswerConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8000`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_owned(),
        }
    }
}

/// Persistent storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the researcher registry and source cache.
    /// `None` keeps everything in memory (lost on restart).
    pub database_path: Option<PathBuf>,
    /// Insert the built-in researcher on first open of an empty registry.
    pub seed_registry: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: Some(crate::paths::database_file()),
            seed_registry: true,
        }
    }
}

/// External answer-generation service (OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Base URL, with or without a trailing `/v1`, e.g.
    /// `https://api.openai.com/v1`. Chat is disabled when unset.
    pub endpoint: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "RESEARCHTWIN_ANSWER_API_KEY".to_owned(),
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (see [`crate::paths::config_file`]).
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Load from the default path if it exists, defaults otherwise, then
    /// apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        let mut config = if path.exists() {
            tracing::info!(path = %path.display(), "loading config");
            Self::from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(GITHUB_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.aggregate.github_token = Some(token.trim().to_owned());
        }
    }

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] for an unparsable bind address, a
    /// zero answer timeout, or any invalid aggregation setting.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.answer.timeout_secs == 0 {
            return Err(ServiceError::Config(
                "answer.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.answer.endpoint.is_some() && self.answer.model.trim().is_empty() {
            return Err(ServiceError::Config(
                "answer.model must be set when answer.endpoint is set".into(),
            ));
        }
        self.aggregate.validate()?;
        Ok(())
    }

    /// Parsed `server.bind`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| ServiceError::Config(format!("invalid server.bind '{}': {e}", self.server.bind)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use twin_core::{RefreshMode, SourceKind};

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.answer.timeout_secs, 30);
        assert!(config.answer.endpoint.is_none());
        assert_eq!(config.aggregate.discover_limit, 50);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ServiceConfig::default();
        config.server.bind = "0.0.0.0:9000".into();
        config.aggregate.refresh_mode = RefreshMode::Background;
        config.aggregate.sources = vec![SourceKind::GitHub, SourceKind::Figshare];
        config.answer.endpoint = Some("http://localhost:1234/v1".into());

        config.save_to_file(&path).expect("save");
        let loaded = ServiceConfig::from_file(&path).expect("load");
        assert_eq!(loaded.server.bind, "0.0.0.0:9000");
        assert_eq!(loaded.aggregate.refresh_mode, RefreshMode::Background);
        assert_eq!(loaded.aggregate.sources, [SourceKind::GitHub, SourceKind::Figshare]);
        assert_eq!(loaded.answer.endpoint.as_deref(), Some("http://localhost:1234/v1"));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:8080"

            [aggregate]
            aggregate_timeout_secs = 10
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.aggregate.aggregate_timeout_secs, 10);
        assert_eq!(config.aggregate.request_timeout_secs, 15);
        assert_eq!(config.answer.max_tokens, 1024);
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write");
        assert!(matches!(ServiceConfig::from_file(&path), Err(ServiceError::Config(_))));
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ServiceConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ServiceError::Io(_))));
    }

    #[test]
    fn invalid_bind_is_rejected() {
        let mut config = ServiceConfig::default();
        config.server.bind = "not an address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_aggregate_section_is_rejected() {
        let mut config = ServiceConfig::default();
        config.aggregate.aggregate_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ServiceError::Core(_))));
    }

    #[test]
    fn github_token_override() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(|name| (name == GITHUB_TOKEN_ENV).then(|| " ghp_abc ".to_owned()));
        assert_eq!(config.aggregate.github_token.as_deref(), Some("ghp_abc"));

        let mut blank = ServiceConfig::default();
        blank.apply_overrides(|_| Some("   ".to_owned()));
        assert!(blank.aggregate.github_token.is_none());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = ServiceConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }
}
