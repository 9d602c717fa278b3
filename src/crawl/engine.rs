//! The pagination state machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::persist::persist_links;
use super::{
    CrawlContext, CrawlReport, CrawlState, FetchOutcome, PageState, SearchDriver, Termination,
};
use crate::browser::PageRenderer;
use crate::consent::ConsentHandler;
use crate::fetcher::ResourceFetcher;
use crate::query::{ConfigError, Query};
use crate::search::{
    Backend, PageExtraction, RawResponse, ResultExtractor, SearchApi, SearchEngine, SearchError,
};

/// Drives one query through a search backend and persists what it finds.
pub struct CrawlEngine {
    ctx: CrawlContext,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl CrawlEngine {
    pub fn new(ctx: CrawlContext, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { ctx, fetcher }
    }

    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    /// Run `query` to completion.
    ///
    /// Only invalid configuration is an error. Every other failure ends up
    /// in the report, either as a failed outcome or as the termination reason.
    pub async fn run(
        &self,
        query: &Query,
        driver: &mut SearchDriver,
    ) -> Result<CrawlReport, ConfigError> {
        transition(&CrawlState::Init);
        if self.ctx.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let backend = driver.backend();
        info!(
            "Searching {} for '{}' (limit {})",
            backend,
            query.keyword(),
            query.limit()
        );

        let (outcomes, termination, pages) = match driver {
            SearchDriver::Api(api) => self.run_api(query, api.as_ref()).await,
            SearchDriver::Browser { engine, renderer } => {
                self.run_browser(query, *engine, renderer.as_mut()).await
            }
        };

        transition(&CrawlState::Done(termination.clone()));
        info!(
            "Crawl finished after {} page(s), {} link(s): {}",
            pages,
            outcomes.len(),
            termination
        );

        Ok(CrawlReport {
            backend,
            outcomes,
            termination,
            pages,
        })
    }

    /// Single round trip against a structured search API.
    async fn run_api(
        &self,
        query: &Query,
        api: &dyn SearchApi,
    ) -> (Vec<FetchOutcome>, Termination, usize) {
        let extractor = Backend::Api.extractor();
        let processed = AtomicUsize::new(0);

        transition(&CrawlState::FetchingPage);
        if self.ctx.cancel.is_cancelled() {
            return (Vec::new(), Termination::Cancelled, 0);
        }

        let search_string = query.api_search_string();
        info!("Search string: {}", search_string);

        let records = match api.search(&search_string, query.limit()).await {
            Ok(records) => records,
            Err(e) => {
                error!("Error retrieving results from {}: {}", api.name(), e);
                return (Vec::new(), Termination::SearchFailed(e.to_string()), 0);
            }
        };
        info!("Number of results: {}", records.len());

        transition(&CrawlState::Extracting);
        let extraction = match extractor.extract(&RawResponse::Records(records), query.limit()) {
            Ok(extraction) => extraction,
            Err(SearchError::EmptyResult) => {
                info!("No results.");
                return (Vec::new(), Termination::NoResults, 0);
            }
            Err(e) => return (Vec::new(), Termination::SearchFailed(e.to_string()), 0),
        };

        for link in &extraction.links {
            info!("{}: {}", api.name(), link.url);
        }

        if self.ctx.cancel.is_cancelled() {
            return (Vec::new(), Termination::Cancelled, 1);
        }

        transition(&CrawlState::Persisting);
        let outcomes = self.persist(query, extraction, &processed).await;

        transition(&CrawlState::Advancing);
        let termination = if processed.load(Ordering::SeqCst) >= query.limit() {
            Termination::LimitReached
        } else {
            Termination::EndOfResults
        };

        (outcomes, termination, 1)
    }

    /// Page-by-page crawl of a rendered search engine.
    async fn run_browser(
        &self,
        query: &Query,
        engine: SearchEngine,
        renderer: &mut dyn PageRenderer,
    ) -> (Vec<FetchOutcome>, Termination, usize) {
        let extractor = Backend::Browser { engine }.extractor();
        let consent = ConsentHandler::new(self.ctx.consent_timeout);
        let processed = AtomicUsize::new(0);

        let mut page = PageState::new(query.browser_search_url(engine));
        info!("SearchUrl: {}", page.current_url());

        let mut outcomes = Vec::new();
        let mut pages = 0;
        let mut loaded = false;
        let mut response: Option<RawResponse> = None;
        let mut extraction = PageExtraction::default();
        let mut state = CrawlState::ConsentPending;

        let termination = loop {
            if let CrawlState::Done(termination) = state {
                break termination;
            }
            if self.ctx.cancel.is_cancelled() {
                info!("Crawl cancelled on page {}", page.page_index() + 1);
                break Termination::Cancelled;
            }
            transition(&state);

            state = match state {
                CrawlState::ConsentPending if page.consent_handled() => CrawlState::FetchingPage,
                CrawlState::ConsentPending => {
                    // The consent wall sits on the first page, so it has to be
                    // loaded before the control can be clicked.
                    match renderer.navigate(page.current_url()).await {
                        Ok(()) => {
                            loaded = true;
                            if let Err(e) = consent.handle(renderer, engine).await {
                                warn!("{}", e);
                            }
                            page.mark_consent_handled();
                            CrawlState::FetchingPage
                        }
                        Err(e) => CrawlState::Done(Termination::SearchFailed(e.to_string())),
                    }
                }

                CrawlState::FetchingPage => {
                    match self.fetch_page(renderer, &mut page, loaded).await {
                        Ok(Some(raw)) => {
                            response = Some(raw);
                            CrawlState::Extracting
                        }
                        Ok(None) => {
                            info!("Result page unchanged, stopping");
                            CrawlState::Done(Termination::StalePage)
                        }
                        Err(e) => {
                            error!("Unable to load {}: {}", page.current_url(), e);
                            CrawlState::Done(Termination::SearchFailed(e))
                        }
                    }
                }

                CrawlState::Extracting => {
                    loaded = false;
                    let raw = response.take();
                    match raw.map(|raw| extractor.extract(&raw, query.limit())) {
                        Some(Ok(found)) => {
                            pages += 1;
                            debug!(
                                "Page {} yielded {} link(s)",
                                page.page_index() + 1,
                                found.links.len()
                            );
                            extraction = found;
                            CrawlState::Persisting
                        }
                        Some(Err(SearchError::EmptyResult)) => {
                            CrawlState::Done(Termination::NoResults)
                        }
                        Some(Err(e)) => CrawlState::Done(Termination::SearchFailed(e.to_string())),
                        None => CrawlState::Done(Termination::SearchFailed(
                            "no page to extract".to_string(),
                        )),
                    }
                }

                CrawlState::Persisting => {
                    let found = PageExtraction {
                        links: std::mem::take(&mut extraction.links),
                        next_page: None,
                    };
                    outcomes.extend(self.persist(query, found, &processed).await);
                    CrawlState::Advancing
                }

                CrawlState::Advancing => {
                    let count = processed.load(Ordering::SeqCst);
                    match extraction.next_page.take() {
                        _ if count >= query.limit() => CrawlState::Done(Termination::LimitReached),
                        None => {
                            info!("No more results");
                            CrawlState::Done(Termination::EndOfResults)
                        }
                        Some(next) => {
                            page.advance(next);
                            info!("Next SearchUrl: {}", page.current_url());
                            self.pause_between_pages().await;
                            CrawlState::FetchingPage
                        }
                    }
                }

                CrawlState::Init | CrawlState::Done(_) => {
                    CrawlState::Done(Termination::SearchFailed("invalid crawl state".to_string()))
                }
            };
        };

        (outcomes, termination, pages)
    }

    /// Load the current page and snapshot it.
    ///
    /// Returns `None` when the page is identical to the previous one.
    async fn fetch_page(
        &self,
        renderer: &mut dyn PageRenderer,
        page: &mut PageState,
        already_loaded: bool,
    ) -> Result<Option<RawResponse>, String> {
        if !already_loaded {
            renderer
                .navigate(page.current_url())
                .await
                .map_err(|e| e.to_string())?;
        }

        let html = renderer.content().await.map_err(|e| e.to_string())?;
        if page.is_stale(&html) {
            return Ok(None);
        }
        page.record_snapshot(&html);

        let page_url = renderer
            .current_url()
            .await
            .unwrap_or_else(|| page.current_url().to_string());

        Ok(Some(RawResponse::Html { html, page_url }))
    }

    /// Persist the page's links, clipped to what is left of the limit.
    async fn persist(
        &self,
        query: &Query,
        extraction: PageExtraction,
        processed: &AtomicUsize,
    ) -> Vec<FetchOutcome> {
        let remaining = query
            .limit()
            .saturating_sub(processed.load(Ordering::SeqCst));

        let mut links = extraction.links;
        if links.len() > remaining {
            debug!(
                "Keeping {} of {} link(s) to stay within the limit",
                remaining,
                links.len()
            );
            links.truncate(remaining);
        }

        persist_links(
            self.fetcher.as_ref(),
            &self.ctx,
            query.keyword(),
            links,
            query.download(),
            processed,
        )
        .await
    }

    async fn pause_between_pages(&self) {
        if self.ctx.page_delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.ctx.page_delay) => {}
            _ = self.ctx.cancel.cancelled() => {}
        }
    }
}

fn transition(state: &CrawlState) {
    debug!("Crawl state: {:?}", state);
}
