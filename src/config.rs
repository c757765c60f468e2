//! Configuration file parser for ~/.config/newswave/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are collected alongside the known ones and logged.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::query::DEFAULT_RETRIES;

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "NEWSWAVE_API_URL";
/// Environment variable overriding `api_token`.
pub const API_TOKEN_ENV: &str = "NEWSWAVE_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large (max {max} bytes)")]
    TooLarge { max: u64 },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Any subset of keys may be given; the rest keep their defaults. `Debug`
/// masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the article service.
    pub api_base_url: String,

    /// Timeout for a whole HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Extra attempts for a failed read. Writes are never retried.
    pub query_retries: u32,

    /// Maximum number of cached query results.
    pub cache_max_entries: u64,

    /// Favorites store file. Defaults to `favorites.json` in the config directory.
    pub favorites_file: Option<PathBuf>,

    /// Bearer token forwarded to the article service (alternative to
    /// NEWSWAVE_API_TOKEN env var). Env var takes precedence.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".to_string(),
            request_timeout_secs: 30,
            query_retries: DEFAULT_RETRIES,
            cache_max_entries: 1000,
            favorites_file: None,
            api_token: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("query_retries", &self.query_retries)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("favorites_file", &self.favorites_file)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// On-disk shape: the known settings plus whatever else the file contains,
/// so typos can be reported instead of silently dropped.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(flatten)]
    config: Config,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

/// Maximum config file size (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing or blank file gives the defaults. Unknown keys are logged
    /// and ignored. Files over 1 MB and invalid TOML are errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(text) = read_bounded(path, MAX_FILE_SIZE)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let file: ConfigFile = toml::from_str(&text)?;
        for key in file.unknown.keys() {
            tracing::warn!(key = %key, path = %path.display(), "Unknown key in config file, ignoring");
        }
        tracing::info!(path = %path.display(), api = %file.config.api_base_url, "Loaded configuration");
        Ok(file.config)
    }

    /// Apply NEWSWAVE_API_URL / NEWSWAVE_API_TOKEN overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(API_TOKEN_ENV).ok(),
        )
    }

    fn with_overrides(mut self, api_url: Option<String>, api_token: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = api_token.filter(|t| !t.is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Favorites store location, relative to `config_dir` unless configured.
    pub fn favorites_path(&self, config_dir: &Path) -> PathBuf {
        self.favorites_file
            .clone()
            .unwrap_or_else(|| config_dir.join("favorites.json"))
    }
}

/// Contents of `path`, or `None` if it does not exist. Reads at most
/// `limit + 1` bytes, so an oversized file is rejected without loading it.
fn read_bounded(path: &Path, limit: u64) -> Result<Option<String>, ConfigError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };

    let mut bytes = Vec::new();
    file.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ConfigError::TooLarge { max: limit });
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| ConfigError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

// ============================================================================
// Tests
// ============================================================================
