//! Search backends and result extraction.
//!
//! Two kinds of backend exist: a structured search API that answers a query
//! with a list of records in one round trip, and rendered search engines whose
//! result pages are read out of HTML one page at a time. Both are read through
//! the [`ResultExtractor`] trait so the crawl loop does not care which one it
//! is driving.

pub mod api;
pub mod duckduckgo;
pub mod google;
pub mod yahoo;

pub use api::{ApiExtractor, SearchApi, SearchRecord};
pub use duckduckgo::DuckDuckGoApi;
pub use google::GoogleExtractor;
pub use yahoo::YahooExtractor;

use std::fmt;
use std::str::FromStr;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Error type for search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search returned no results")]
    EmptyResult,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search provider unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Rendered search engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    Google,
    Yahoo,
}

impl SearchEngine {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Yahoo => "yahoo",
        }
    }

    /// Short tag used when logging discovered links.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Google => "G",
            Self::Yahoo => "Y",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy used to obtain search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Structured search API, one round trip.
    #[default]
    Api,
    /// Rendered search engine, paginated.
    Browser { engine: SearchEngine },
}

impl Backend {
    /// Resolve a backend by name.
    ///
    /// Unknown names fall back to Google with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.parse::<Self>() {
            Ok(backend) => backend,
            Err(()) => {
                warn!("Invalid search engine name: {}, using Google", name);
                Self::Browser {
                    engine: SearchEngine::Google,
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Api => "duckduckgo",
            Self::Browser { engine } => engine.name(),
        }
    }

    /// Check if this backend needs a rendering session.
    pub fn requires_browser(&self) -> bool {
        matches!(self, Self::Browser { .. })
    }

    /// Extractor for this backend's raw responses.
    pub fn extractor(&self) -> Box<dyn ResultExtractor> {
        match self {
            Self::Api => Box::new(ApiExtractor),
            Self::Browser {
                engine: SearchEngine::Google,
            } => Box::new(GoogleExtractor),
            Self::Browser {
                engine: SearchEngine::Yahoo,
            } => Box::new(YahooExtractor),
        }
    }
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" | "ddg" | "duckduckgo" => Ok(Self::Api),
            "google" => Ok(Self::Browser {
                engine: SearchEngine::Google,
            }),
            "yahoo" => Ok(Self::Browser {
                engine: SearchEngine::Yahoo,
            }),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A link to a resource, in the order the provider ranked it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultLink {
    pub url: String,
}

impl ResultLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A raw search response, as handed to an extractor.
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// Structured records from a search API.
    Records(Vec<SearchRecord>),
    /// Rendered HTML and the URL it was rendered from.
    Html { html: String, page_url: String },
}

/// Links found on one result page, plus where to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub links: Vec<ResultLink>,
    /// Next result page; `None` at the end of the results.
    pub next_page: Option<String>,
}

/// Turns a raw search response into ordered result links.
pub trait ResultExtractor: Send + Sync {
    /// Extract links from `raw`.
    ///
    /// `limit` caps the number of links for single-shot API responses;
    /// page extractors return everything on the page and leave the budget to
    /// the caller.
    fn extract(&self, raw: &RawResponse, limit: usize) -> Result<PageExtraction, SearchError>;
}

pub(crate) fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css)
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector {}: {:?}", css, e)))
}

/// Resolve a possibly relative href against the page it was found on.
pub(crate) fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    url::Url::parse(page_url)
        .and_then(|base| base.join(href))
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("ddg".parse::<Backend>(), Ok(Backend::Api));
        assert_eq!(
            "Yahoo".parse::<Backend>(),
            Ok(Backend::Browser {
                engine: SearchEngine::Yahoo
            })
        );
        assert!("bing".parse::<Backend>().is_err());
    }

    #[test]
    fn unknown_backend_falls_back_to_google() {
        assert_eq!(
            Backend::from_name("altavista"),
            Backend::Browser {
                engine: SearchEngine::Google
            }
        );
    }

    #[test]
    fn only_browser_backends_require_browser() {
        assert!(!Backend::Api.requires_browser());
        assert!(Backend::from_name("google").requires_browser());
    }

    #[test]
    fn relative_href_resolution() {
        assert_eq!(
            resolve_href("https://www.google.com/search?q=x", "/search?q=x&start=10"),
            Some("https://www.google.com/search?q=x&start=10".to_string())
        );
        assert_eq!(
            resolve_href("https://www.google.com/", "https://example.org/a"),
            Some("https://example.org/a".to_string())
        );
    }

    #[test]
    fn search_error_display() {
        let err = SearchError::Unavailable("503".to_string());
        assert!(err.to_string().contains("unavailable"));
        assert!(SearchError::EmptyResult.to_string().contains("no results"));
    }
}
