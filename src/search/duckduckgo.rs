//! DuckDuckGo search API.
//!
//! Uses the DuckDuckGo HTML endpoint and reads result anchors out of it, which
//! gives a structured list of records in a single request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::debug;

use super::{selector, SearchApi, SearchError, SearchRecord};
use crate::fetcher::BROWSER_USER_AGENT;

/// DuckDuckGo search URL.
const DDG_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Worldwide results.
pub const DEFAULT_REGION: &str = "wt-wt";

/// `kp` value turning safe search off.
const SAFE_SEARCH_OFF: &str = "-2";

/// Search API backed by DuckDuckGo.
pub struct DuckDuckGoApi {
    client: Client,
    region: String,
}

impl DuckDuckGoApi {
    /// Create a new DuckDuckGo client.
    pub fn new(timeout: Duration, region: &str) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            region: region.to_string(),
        })
    }

    /// Parse search results from HTML.
    fn parse_results(&self, html: &str) -> Result<Vec<SearchRecord>, SearchError> {
        let document = Html::parse_document(html);

        // DuckDuckGo HTML results are in <a class="result__a"> elements
        // Each result is a div.result holding its title anchor and, usually,
        // a snippet anchor.
        let container_selector = selector("div.result")?;
        let title_selector = selector("a.result__a")?;
        let snippet_selector = selector(".result__snippet")?;

        let mut results = Vec::new();

        for container in document.select(&container_selector) {
            let Some(anchor) = container.select(&title_selector).next() else {
                continue;
            };
            let Some(url) = anchor.value().attr("href").and_then(extract_url) else {
                continue;
            };

            let title = anchor.text().collect::<String>().trim().to_string();
            let body = container
                .select(&snippet_selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());

            results.push(SearchRecord {
                href: url,
                title: if title.is_empty() { None } else { Some(title) },
                body,
            });
        }

        debug!("Parsed {} results from DuckDuckGo", results.len());
        Ok(results)
    }
}

/// Extract the actual URL from DuckDuckGo's redirect URL.
fn extract_url(href: &str) -> Option<String> {
    if href.starts_with("//duckduckgo.com/l/") {
        // Redirect form: //duckduckgo.com/l/?uddg=<encoded_url>&...
        let uddg_start = href.find("uddg=")?;
        let encoded = &href[uddg_start + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());

        urlencoding::decode(&encoded[..end])
            .ok()
            .map(|s| s.into_owned())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with("//") {
        Some(format!("https:{}", href))
    } else {
        None
    }
}

#[async_trait]
impl SearchApi for DuckDuckGoApi {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchRecord>, SearchError> {
        debug!("DuckDuckGo search: {}", query);

        let response = self
            .client
            .post(DDG_SEARCH_URL)
            .form(&[
                ("q", query),
                ("kl", self.region.as_str()),
                ("kp", SAFE_SEARCH_OFF),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Unavailable(format!(
                "DuckDuckGo returned {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        let mut results = self.parse_results(&html)?;
        results.truncate(max_results);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r##"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fa.pdf&rut=abc">A report</a>
            <a class="result__snippet" href="#">First snippet</a>
          </div>
          <div class="result">
            <a class="result__a" href="/relative">Ignored</a>
            <a class="result__snippet" href="#">Snippet of an ignored result</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://example.org/no-snippet.pdf">No snippet</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://example.org/b.pdf">B report</a>
            <a class="result__snippet" href="#">Second snippet</a>
          </div>
        </body></html>
    "##;

    #[test]
    fn extract_direct_url() {
        assert_eq!(
            extract_url("https://example.gov/doc.pdf"),
            Some("https://example.gov/doc.pdf".to_string())
        );
    }

    #[test]
    fn extract_protocol_relative_url() {
        assert_eq!(
            extract_url("//example.gov/doc.pdf"),
            Some("https://example.gov/doc.pdf".to_string())
        );
    }

    #[test]
    fn extract_redirect_url() {
        assert_eq!(
            extract_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.gov%2Fx.pdf&rut=1"),
            Some("https://example.gov/x.pdf".to_string())
        );
        assert_eq!(extract_url("//duckduckgo.com/l/?rut=1"), None);
    }

    #[test]
    fn parses_result_page_in_order() {
        let api = DuckDuckGoApi::new(Duration::from_secs(5), DEFAULT_REGION).unwrap();
        let records = api.parse_results(RESULTS_HTML).unwrap();

        let hrefs: Vec<&str> = records.iter().map(|r| r.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "https://example.org/a.pdf",
                "https://example.org/no-snippet.pdf",
                "https://example.org/b.pdf",
            ]
        );
        assert_eq!(records[0].title.as_deref(), Some("A report"));
    }

    #[test]
    fn snippets_stay_with_their_own_result() {
        let api = DuckDuckGoApi::new(Duration::from_secs(5), DEFAULT_REGION).unwrap();
        let records = api.parse_results(RESULTS_HTML).unwrap();

        assert_eq!(records[0].body.as_deref(), Some("First snippet"));
        assert_eq!(records[1].body, None);
        assert_eq!(records[2].body.as_deref(), Some("Second snippet"));
    }
}
