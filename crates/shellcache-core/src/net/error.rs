use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error {status}: {url}")]
    ServerError { status: u16, url: String },

    #[error("Unexpected status {status}: {url}")]
    UnexpectedStatus { status: u16, url: String },
}

impl FetchError {
    /// Error for a response that resolved with a non-ok status.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            404 => FetchError::NotFound(url.to_string()),
            500..=599 => FetchError::ServerError {
                status,
                url: url.to_string(),
            },
            _ => FetchError::UnexpectedStatus {
                status,
                url: url.to_string(),
            },
        }
    }

    /// True when no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(FetchError::from_status(404, "u"), FetchError::NotFound(_)));
        assert!(matches!(
            FetchError::from_status(503, "u"),
            FetchError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            FetchError::from_status(403, "u"),
            FetchError::UnexpectedStatus { status: 403, .. }
        ));
        assert!(!FetchError::from_status(500, "u").is_transport());
        assert!(FetchError::Connection("offline".into()).is_transport());
    }
}
