//! HTTP fetcher used for install staging, request interception and
//! offline fills.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use url::Url;

use super::FetchError;
use crate::models::Response;

/// How a fetch treats intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Default,
    /// Bypass intermediate caches and go to the origin server.
    Reload,
}

/// Resolves a URL to a response. A non-ok status is still `Ok`; only a
/// transport failure is an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<Response, FetchError>;
}

/// Fetcher backed by a shared reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn content_type(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<Response, FetchError> {
        let mut request = self.client.get(url.clone());
        if mode == FetchMode::Reload {
            request = request
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = Self::content_type(&response);
        let body = response.bytes().await?;

        debug!(url = %url, status, bytes = body.len(), ?mode, "Fetched resource");

        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}
