use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp for `{id}`: {source}")]
    Timestamp {
        id: String,
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Catalog(#[from] catalog::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
