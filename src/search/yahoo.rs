//! Yahoo result page extraction.

use std::collections::HashSet;

use scraper::Html;
use tracing::{debug, info, warn};

use super::{
    resolve_href, selector, PageExtraction, RawResponse, ResultExtractor, ResultLink, SearchEngine,
    SearchError,
};

/// Class marker carried by result title anchors.
const RESULT_ANCHOR: &str = r#"a[class*="tc va-bot mxw-100p"][href]"#;

/// "Next" pagination link.
const NEXT_PAGE: &str = "a.next[href]";

/// Extractor for rendered Yahoo result pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct YahooExtractor;

impl YahooExtractor {
    /// Parse one rendered result page.
    pub fn parse_page(&self, html: &str, page_url: &str) -> Result<PageExtraction, SearchError> {
        let document = Html::parse_document(html);
        let anchor_selector = selector(RESULT_ANCHOR)?;
        let next_selector = selector(NEXT_PAGE)?;

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        let mut anchors = 0;

        for anchor in document.select(&anchor_selector) {
            anchors += 1;
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };

            let href = unwrap_redirect(href);
            info!("{}: {}", SearchEngine::Yahoo.tag(), href);

            let Some(url) = resolve_href(page_url, &href) else {
                debug!("Skipping unresolvable result {}", href);
                continue;
            };

            if seen.insert(url.clone()) {
                links.push(ResultLink::new(url));
            }
        }

        if anchors == 0 {
            warn!("No results found on {}. The result page layout may have changed", page_url);
        }

        let next_page = document
            .select(&next_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_href(page_url, href));

        match next_page {
            Some(ref next) => debug!("next page {}", next),
            None => debug!("No more results after {}", page_url),
        }

        Ok(PageExtraction { links, next_page })
    }
}

/// Extract the target from Yahoo's click-tracking redirect.
///
/// Tracked links look like `https://r.search.yahoo.com/.../RU=<encoded>/RK=2/RS=...`.
fn unwrap_redirect(href: &str) -> String {
    let Some(start) = href.find("/RU=") else {
        return href.to_string();
    };
    let encoded = &href[start + 4..];
    let end = encoded.find("/RK=").unwrap_or(encoded.len());

    match urlencoding::decode(&encoded[..end]) {
        Ok(decoded) if decoded.starts_with("http") => decoded.into_owned(),
        _ => href.to_string(),
    }
}

impl ResultExtractor for YahooExtractor {
    fn extract(&self, raw: &RawResponse, _limit: usize) -> Result<PageExtraction, SearchError> {
        match raw {
            RawResponse::Html { html, page_url } => self.parse_page(html, page_url),
            RawResponse::Records(_) => Err(SearchError::Parse(
                "Yahoo extractor expects rendered HTML".to_string(),
            )),
        }
    }
}
