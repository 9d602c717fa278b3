//! Pagination state of a rendered-engine crawl.

use sha2::{Digest, Sha256};

/// Where a browser crawl is, and what it saw last.
///
/// Owned by exactly one crawl. The page index only moves forward.
#[derive(Debug, Clone)]
pub struct PageState {
    current_url: String,
    last_snapshot: Option<[u8; 32]>,
    page_index: usize,
    consent_handled: bool,
}

impl PageState {
    pub fn new(first_page_url: impl Into<String>) -> Self {
        Self {
            current_url: first_page_url.into(),
            last_snapshot: None,
            page_index: 0,
            consent_handled: false,
        }
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Zero-based index of the page being processed.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn consent_handled(&self) -> bool {
        self.consent_handled
    }

    pub fn mark_consent_handled(&mut self) {
        self.consent_handled = true;
    }

    /// Whether `html` is byte-identical to the previously recorded page.
    pub fn is_stale(&self, html: &str) -> bool {
        self.last_snapshot == Some(snapshot(html))
    }

    /// Remember `html` as the latest rendered page.
    pub fn record_snapshot(&mut self, html: &str) {
        self.last_snapshot = Some(snapshot(html));
    }

    /// Move on to the next page.
    pub fn advance(&mut self, next_url: String) {
        self.current_url = next_url;
        self.page_index += 1;
    }
}

fn snapshot(html: &str) -> [u8; 32] {
    Sha256::digest(html.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_never_stale() {
        let state = PageState::new("https://example.org/search");
        assert!(!state.is_stale("<html></html>"));
    }

    #[test]
    fn identical_snapshot_is_stale() {
        let mut state = PageState::new("https://example.org/search");
        state.record_snapshot("<html>page 1</html>");
        assert!(state.is_stale("<html>page 1</html>"));
        assert!(!state.is_stale("<html>page 2</html>"));
    }

    #[test]
    fn advance_moves_forward() {
        let mut state = PageState::new("https://example.org/search?p=1");
        state.advance("https://example.org/search?p=2".to_string());
        state.advance("https://example.org/search?p=3".to_string());
        assert_eq!(state.page_index(), 2);
        assert_eq!(state.current_url(), "https://example.org/search?p=3");
    }
}
