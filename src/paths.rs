//! Centralized path resolution for researchtwin directories.
//!
//! Defaults follow the platform conventions from `dirs`; each can be
//! overridden with an environment variable for containers and tests.

use std::path::PathBuf;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "RESEARCHTWIN_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "RESEARCHTWIN_DATA_DIR";

/// Application config directory: `dirs::config_dir()/researchtwin/`.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("researchtwin"))
        .unwrap_or_else(|| PathBuf::from("/tmp/researchtwin-config"))
}

/// Application data directory: `dirs::data_dir()/researchtwin/`, or
/// `RESEARCHTWIN_DATA_DIR` when set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("researchtwin"))
        .unwrap_or_else(|| PathBuf::from("/tmp/researchtwin-data"))
}

/// Config file path: `RESEARCHTWIN_CONFIG` when set, else
/// `config_dir()/config.toml`.
#[must_use]
pub fn config_file() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}

/// Default SQLite database path (`data_dir()/researchtwin.db`).
#[must_use]
pub fn database_file() -> PathBuf {
    data_dir().join("researchtwin.db")
}
