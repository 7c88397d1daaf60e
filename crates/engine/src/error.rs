use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] catalog::Error),

    #[error("permission denied: {0}")]
    Denied(String),

    #[error("catalog reload already in progress")]
    ReloadInProgress,
}

pub type Result<T> = std::result::Result<T, Error>;
