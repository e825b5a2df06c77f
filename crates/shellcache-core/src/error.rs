use thiserror::Error;

use crate::net::FetchError;

/// Errors raised by the offline cache coordinator and its storage backends.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fetch failed for {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("Lifecycle violation: {0}")]
    Lifecycle(String),
}

impl Error {
    pub(crate) fn fetch(key: &str, source: FetchError) -> Self {
        Error::Fetch {
            key: key.to_string(),
            source,
        }
    }
}

/// A specialized `Result` type for shellcache operations.
pub type Result<T> = std::result::Result<T, Error>;
