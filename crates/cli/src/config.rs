//! Configuration loading from aclctl.toml.

use engine::{AuthorizerOptions, DEFAULT_CACHE_CAPACITY, DEFAULT_REFRESH_INTERVAL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Where the catalog is read from.
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Catalog source. At most one of `file` and `database` may be set; with
/// neither, the built-in seed catalog is used.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding an array of `acl` documents.
    pub file: Option<PathBuf>,

    /// SQLite database written by `aclctl seed`.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Role sets held before the cache starts over.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshConfig {
    /// Minimum snapshot age, in seconds, before a refresh reloads it.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.catalog.file.is_some() && config.catalog.database.is_some() {
            return Err(ConfigError::ConflictingSources);
        }
        Ok(config)
    }

    pub fn authorizer_options(&self) -> AuthorizerOptions {
        AuthorizerOptions {
            cache: self.cache.enabled,
            cache_capacity: self.cache.capacity,
            refresh_interval: Duration::from_secs(self.refresh.interval_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("catalog.file and catalog.database are both set; pick one")]
    ConflictingSources,
}
