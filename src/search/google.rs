//! Google result page extraction.

use std::collections::HashSet;

use scraper::Html;
use tracing::{debug, info, warn};

use super::{
    resolve_href, selector, PageExtraction, RawResponse, ResultExtractor, ResultLink, SearchEngine,
    SearchError,
};

/// Container wrapping each organic result.
const RESULT_CONTAINER: &str = "div.yuRUbf";

/// "Next" pagination link.
const NEXT_PAGE: &str = "a#pnnext[href]";

/// Links containing these markers point at cached copies or related-result
/// searches, not at documents.
const EXCLUDED_MARKERS: &[&str] = &["webcache", "related"];

/// Extractor for rendered Google result pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleExtractor;

impl GoogleExtractor {
    /// Parse one rendered result page.
    pub fn parse_page(&self, html: &str, page_url: &str) -> Result<PageExtraction, SearchError> {
        let document = Html::parse_document(html);
        let container_selector = selector(RESULT_CONTAINER)?;
        let anchor_selector = selector("a[href]")?;
        let next_selector = selector(NEXT_PAGE)?;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        let mut containers = 0;

        for container in document.select(&container_selector) {
            containers += 1;

            let Some(href) = container
                .select(&anchor_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };

            info!("{}: {}", SearchEngine::Google.tag(), href);

            if is_excluded(href) {
                debug!("Skipping cached or related result {}", href);
                continue;
            }

            let Some(url) = resolve_href(page_url, href) else {
                debug!("Skipping unresolvable result {}", href);
                continue;
            };

            if seen.insert(url.clone()) {
                links.push(ResultLink::new(url));
            }
        }

        if containers == 0 {
            warn!("No results found on {}. The result page layout may have changed", page_url);
        }

        let next_page = document
            .select(&next_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_href(page_url, href));

        match next_page {
            Some(ref next) => debug!("G next result page {}", next),
            None => debug!("No more results after {}", page_url),
        }

        Ok(PageExtraction { links, next_page })
    }
}

fn is_excluded(href: &str) -> bool {
    EXCLUDED_MARKERS.iter().any(|m| href.contains(m))
}

impl ResultExtractor for GoogleExtractor {
    fn extract(&self, raw: &RawResponse, _limit: usize) -> Result<PageExtraction, SearchError> {
        match raw {
            RawResponse::Html { html, page_url } => self.parse_page(html, page_url),
            RawResponse::Records(_) => Err(SearchError::Parse(
                "Google extractor expects rendered HTML".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://www.google.com/search?q=%22test%22";

    fn result(href: &str) -> String {
        format!(
            r#"<div class="g"><div class="yuRUbf"><a href="{}"><h3>Title</h3></a>
               <a href="https://other.example/ignored">second anchor</a></div></div>"#,
            href
        )
    }

    fn page(results: &[&str], next: Option<&str>) -> String {
        let body: String = results.iter().map(|h| result(h)).collect();
        let next = next
            .map(|n| format!(r#"<a id="pnnext" href="{}">Next</a>"#, n))
            .unwrap_or_default();
        format!("<html><body><div id=\"search\">{}</div>{}</body></html>", body, next)
    }

    #[test]
    fn extracts_first_anchor_of_each_container() {
        let html = page(
            &["https://example.org/a.pdf", "https://example.org/b.pdf"],
            None,
        );
        let extraction = GoogleExtractor.parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(
            extraction.links,
            vec![
                ResultLink::new("https://example.org/a.pdf"),
                ResultLink::new("https://example.org/b.pdf"),
            ]
        );
    }

    #[test]
    fn excludes_webcache_and_related_links() {
        let html = page(
            &[
                "https://webcache.googleusercontent.com/search?q=cache:abc",
                "https://example.org/keep.pdf",
                "/search?q=related:example.org",
            ],
            None,
        );
        let extraction = GoogleExtractor.parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(
            extraction.links,
            vec![ResultLink::new("https://example.org/keep.pdf")]
        );
    }

    #[test]
    fn next_page_is_resolved_against_google() {
        let html = page(&["https://example.org/a.pdf"], Some("/search?q=test&start=10"));
        let extraction = GoogleExtractor.parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(
            extraction.next_page.as_deref(),
            Some("https://www.google.com/search?q=test&start=10")
        );
    }

    #[test]
    fn missing_next_link_ends_results() {
        let html = page(&["https://example.org/a.pdf"], None);
        let extraction = GoogleExtractor.parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(extraction.next_page, None);
    }

    #[test]
    fn page_without_results_is_empty_not_error() {
        let extraction = GoogleExtractor
            .parse_page("<html><body>consent wall</body></html>", PAGE_URL)
            .unwrap();
        assert!(extraction.links.is_empty());
        assert_eq!(extraction.next_page, None);
    }

    #[test]
    fn duplicate_results_are_dropped() {
        let html = page(
            &["https://example.org/a.pdf", "https://example.org/a.pdf"],
            None,
        );
        let extraction = GoogleExtractor.parse_page(&html, PAGE_URL).unwrap();
        assert_eq!(extraction.links.len(), 1);
    }

    #[test]
    fn records_are_rejected() {
        let raw = RawResponse::Records(Vec::new());
        assert!(GoogleExtractor.extract(&raw, 10).is_err());
    }
}
