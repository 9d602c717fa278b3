//! Structured search API backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{PageExtraction, RawResponse, ResultExtractor, ResultLink, SearchError};

/// A single structured search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Fetchable URL of the result.
    pub href: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl SearchRecord {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: None,
            body: None,
        }
    }
}

/// A search provider answering a query string with structured records.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Run one search, returning at most `max_results` records in rank order.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchRecord>, SearchError>;
}

/// Extractor for [`RawResponse::Records`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiExtractor;

impl ResultExtractor for ApiExtractor {
    fn extract(&self, raw: &RawResponse, limit: usize) -> Result<PageExtraction, SearchError> {
        let records = match raw {
            RawResponse::Records(records) => records,
            RawResponse::Html { .. } => {
                return Err(SearchError::Parse(
                    "API extractor received rendered HTML".to_string(),
                ))
            }
        };

        if records.is_empty() {
            return Err(SearchError::EmptyResult);
        }

        let links = records
            .iter()
            .filter(|r| !r.href.trim().is_empty())
            .take(limit)
            .map(|r| ResultLink::new(r.href.trim()))
            .collect();

        Ok(PageExtraction {
            links,
            next_page: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> RawResponse {
        RawResponse::Records(
            (0..n)
                .map(|i| SearchRecord::new(format!("https://example.org/doc{}.pdf", i)))
                .collect(),
        )
    }

    #[test]
    fn truncates_to_limit_in_order() {
        let page = ApiExtractor.extract(&records(5), 3).unwrap();
        let urls: Vec<_> = page.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.org/doc0.pdf",
                "https://example.org/doc1.pdf",
                "https://example.org/doc2.pdf",
            ]
        );
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn empty_records_are_empty_result() {
        let err = ApiExtractor.extract(&records(0), 10).unwrap_err();
        assert!(matches!(err, SearchError::EmptyResult));
    }

    #[test]
    fn html_is_rejected() {
        let raw = RawResponse::Html {
            html: String::new(),
            page_url: String::new(),
        };
        assert!(matches!(
            ApiExtractor.extract(&raw, 10),
            Err(SearchError::Parse(_))
        ));
    }

    #[test]
    fn record_deserializes_without_optional_fields() {
        let record: SearchRecord =
            serde_json::from_str(r#"{"href": "https://example.org/a.pdf"}"#).unwrap();
        assert_eq!(record, SearchRecord::new("https://example.org/a.pdf"));
    }
}
