//! Catalog error types.

use crate::Violation;
use thiserror::Error;

/// Catalog errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The catalog failed validation. Carries every violation found, not
    /// just the first one.
    #[error("catalog rejected with {} violation(s)", .0.len())]
    Rejected(Vec<Violation>),

    /// Failed to parse a catalog document set.
    #[error("failed to parse catalog: {0}")]
    Parse(String),

    /// A capability type string other than `client` or `server`.
    #[error("unknown capability type `{0}` (expected `client` or `server`)")]
    UnknownCapabilityType(String),

    /// An I/O error occurred while reading a catalog file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalog source failed for its own reasons (database, network).
    #[error("catalog source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// The violations behind a rejected catalog, if that is what this is.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::Rejected(violations) => violations,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
