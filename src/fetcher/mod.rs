//! Resource retrieval.
//!
//! A [`ResourceFetcher`] makes exactly one attempt per URL. Failures come back
//! as [`FetchError`] values for the caller to record; they never abort a crawl.

mod user_agent;

pub use user_agent::{resolve_user_agent, BROWSER_USER_AGENT, USER_AGENT};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// A failed resource retrieval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: String,
}

impl FetchError {
    pub fn new(url: &str, cause: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Retrieves the bytes behind a URL.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url).await
    }
}

/// HTTP fetcher following redirects, with a per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher.
    ///
    /// `user_agent` follows [`resolve_user_agent`]: `None` for the default,
    /// `"browser"` for the desktop Chrome agent, anything else verbatim.
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(url, e))?;

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display() {
        let err = FetchError::new("https://example.org/a.pdf", "connection reset");
        assert_eq!(
            err.to_string(),
            "failed to fetch https://example.org/a.pdf: connection reset"
        );
    }

    #[tokio::test]
    async fn invalid_url_is_fetch_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1), None).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert_eq!(err.url, "not a url");
    }
}
