//! CLI error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    #[error("database not found at {path}. Run 'aclctl seed' first")]
    DatabaseNotFound { path: PathBuf },

    /// `seed` needs a database and none was given.
    #[error("no database configured: pass --db or set catalog.database")]
    NoDatabase,

    /// Both a catalog file and a database were selected.
    #[error("both a catalog file and a database were given; pick one")]
    ConflictingSources,

    /// A catalog file failed validation.
    #[error("{count} violation(s) found")]
    Invalid { count: usize },

    #[error("capability `{capability}` not granted{}", .app.as_deref().map(|a| format!(" for app `{a}`")).unwrap_or_default())]
    CapabilityNotGranted {
        capability: String,
        app: Option<String>,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] catalog::Error),

    #[error(transparent)]
    Engine(#[from] engine::Error),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
