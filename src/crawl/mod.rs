//! Search-and-paginate crawl.
//!
//! [`CrawlEngine`] runs one [`Query`](crate::query::Query) against one
//! [`SearchDriver`]: it fetches a result page, extracts its links, persists
//! them, and follows the next-page descriptor until a [`Termination`]
//! condition fires. Everything that can go wrong after start-up (a failed
//! download, a missing consent button, an empty page) is recorded in the
//! [`CrawlReport`] instead of being raised.

mod engine;
mod page;
mod persist;

pub use engine::CrawlEngine;
pub use page::PageState;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::browser::PageRenderer;
use crate::consent::DEFAULT_CONSENT_TIMEOUT;
use crate::fetcher::FetchError;
use crate::search::{Backend, ResultLink, SearchApi, SearchEngine};

/// Default number of concurrent resource downloads within a page.
pub const DEFAULT_WORKERS: usize = 4;

/// Per-crawl settings, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    /// Directory resources are written under (already including the keyword).
    pub output_dir: PathBuf,
    /// Concurrent downloads within one page.
    pub workers: usize,
    /// Pause between two result pages of a rendered engine.
    pub page_delay: Duration,
    /// How long to wait for a consent control.
    pub consent_timeout: Duration,
    /// Cancels the crawl between state transitions.
    pub cancel: CancellationToken,
}

impl CrawlContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            workers: DEFAULT_WORKERS,
            page_delay: Duration::ZERO,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A backend together with the capability it needs to run.
pub enum SearchDriver {
    Api(Arc<dyn SearchApi>),
    Browser {
        engine: SearchEngine,
        renderer: Box<dyn PageRenderer>,
    },
}

impl SearchDriver {
    pub fn backend(&self) -> Backend {
        match self {
            Self::Api(_) => Backend::Api,
            Self::Browser { engine, .. } => Backend::Browser { engine: *engine },
        }
    }
}

/// Crawl state machine states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    Init,
    ConsentPending,
    FetchingPage,
    Extracting,
    Persisting,
    Advancing,
    Done(Termination),
}

/// Why a crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The provider returned nothing.
    NoResults,
    /// `Query::limit` links were yielded.
    LimitReached,
    /// No further result page exists.
    EndOfResults,
    /// A rendered page was identical to the one before it.
    StalePage,
    /// A result page could not be obtained.
    SearchFailed(String),
    /// The crawl was cancelled.
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResults => write!(f, "no results"),
            Self::LimitReached => write!(f, "limit reached"),
            Self::EndOfResults => write!(f, "no more results"),
            Self::StalePage => write!(f, "result page repeated"),
            Self::SearchFailed(reason) => write!(f, "search failed: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a single resource was not persisted.
#[derive(Debug, thiserror::Error)]
pub enum OutcomeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another link on the same page maps to the same file.
    #[error("{path} is already taken by {taken_by}")]
    PathTaken { path: PathBuf, taken_by: String },
}

/// What happened to one result link.
#[derive(Debug)]
pub struct FetchOutcome {
    pub link: ResultLink,
    /// Where the resource was written, if it was.
    pub local_path: Option<PathBuf>,
    pub error: Option<OutcomeError>,
}

impl FetchOutcome {
    /// Link recorded without downloading.
    pub fn listed(link: ResultLink) -> Self {
        Self {
            link,
            local_path: None,
            error: None,
        }
    }

    pub fn saved(link: ResultLink, path: PathBuf) -> Self {
        Self {
            link,
            local_path: Some(path),
            error: None,
        }
    }

    pub fn failed(link: ResultLink, error: OutcomeError) -> Self {
        Self {
            link,
            local_path: None,
            error: Some(error),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.local_path.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of a finished crawl.
#[derive(Debug)]
pub struct CrawlReport {
    pub backend: Backend,
    /// One outcome per yielded link, in ranking order.
    pub outcomes: Vec<FetchOutcome>,
    pub termination: Termination,
    /// Result pages processed.
    pub pages: usize,
}

impl CrawlReport {
    pub fn links(&self) -> impl Iterator<Item = &ResultLink> {
        self.outcomes.iter().map(|o| &o.link)
    }

    pub fn link_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn saved_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_saved()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts() {
        let report = CrawlReport {
            backend: Backend::Api,
            outcomes: vec![
                FetchOutcome::saved(ResultLink::new("https://a/1"), PathBuf::from("out/1")),
                FetchOutcome::failed(
                    ResultLink::new("https://a/2"),
                    FetchError::new("https://a/2", "HTTP 404").into(),
                ),
                FetchOutcome::listed(ResultLink::new("https://a/3")),
            ],
            termination: Termination::EndOfResults,
            pages: 1,
        };

        assert_eq!(report.link_count(), 3);
        assert_eq!(report.saved_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn termination_display() {
        assert_eq!(Termination::StalePage.to_string(), "result page repeated");
        assert!(Termination::SearchFailed("boom".into())
            .to_string()
            .contains("boom"));
    }

    #[test]
    fn context_defaults() {
        let ctx = CrawlContext::new("out/kw");
        assert_eq!(ctx.workers, DEFAULT_WORKERS);
        assert_eq!(ctx.consent_timeout, DEFAULT_CONSENT_TIMEOUT);
        assert!(!ctx.cancel.is_cancelled());
    }
}
