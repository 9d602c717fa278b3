//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::{info, warn};

use crate::browser::ChromeRenderer;
use crate::config::Settings;
use crate::crawl::{CrawlContext, CrawlEngine, CrawlReport, SearchDriver, Termination};
use crate::fetcher::{HttpFetcher, ResourceFetcher};
use crate::query::{
    browser_filetype_allowed, parse_limit, parse_log_level, Query, BROWSER_FILETYPES,
};
use crate::search::{Backend, DuckDuckGoApi};

#[derive(Parser, Debug)]
#[command(name = "docsweep")]
#[command(about = "Search for documents by keyword and download the results")]
#[command(version)]
pub struct Cli {
    /// Keyword to search for
    #[arg(short = 'w', long = "word")]
    pub word: String,

    /// Base output directory (the keyword is appended)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Restrict results to a file type (pdf, doc, docx, ...)
    #[arg(short, long)]
    pub filetype: Option<String>,

    /// Restrict results to a site
    #[arg(short, long)]
    pub site: Option<String>,

    /// Require a fragment in result URLs
    #[arg(short = 'u', long)]
    pub inurl: Option<String>,

    /// Search backend: api (DuckDuckGo), google or yahoo
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Maximum number of results (0 = 10)
    #[arg(short, long, default_value = "10", value_parser = parse_limit)]
    pub limit: usize,

    /// List results without downloading them
    #[arg(short = 'n', long = "nodownload")]
    pub no_download: bool,

    /// Log level: 0, 10 (debug), 20 (info), 30 (warning), 40 (error), 50 (critical)
    #[arg(short, long, default_value = "0", value_parser = parse_log_level)]
    pub debug: u8,

    /// Settings file (defaults to ./docsweep.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Concurrent downloads per result page
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,
}

impl Cli {
    /// Default tracing filter for the chosen log level.
    pub fn log_filter(&self) -> &'static str {
        match self.debug {
            10 => "docsweep=debug",
            20 => "docsweep=info",
            30 => "docsweep=warn",
            40 | 50 => "docsweep=error",
            _ if self.verbose => "docsweep=debug",
            _ => "docsweep=info",
        }
    }

    /// Build the query for `backend`.
    ///
    /// Rendered engines only understand a few file types. Anything else is
    /// dropped with a warning rather than sent along.
    pub fn query(&self, backend: Backend) -> anyhow::Result<Query> {
        let mut builder = Query::builder(self.word.as_str())
            .limit(self.limit)
            .download(!self.no_download);

        if let Some(site) = &self.site {
            builder = builder.site(site);
        }
        if let Some(inurl) = &self.inurl {
            builder = builder.inurl(inurl);
        }
        if let Some(filetype) = &self.filetype {
            let ext = filetype.trim_start_matches('.');
            if backend.requires_browser() && !browser_filetype_allowed(ext) {
                warn!(
                    "Filetype '{}' is not supported by {} (use one of {}), ignoring it",
                    ext,
                    backend,
                    BROWSER_FILETYPES.join(", ")
                );
            } else {
                builder = builder.filetype(ext);
            }
        }

        Ok(builder.build()?)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(output) = &cli.output {
        settings.output_dir = Some(output.clone());
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }

    let backend = Backend::from_name(cli.engine.as_deref().unwrap_or(&settings.backend));
    let query = cli.query(backend)?;

    let ctx = CrawlContext::new(query.output_root(settings.output_dir.as_deref()))
        .with_workers(settings.workers)
        .with_page_delay(settings.page_delay())
        .with_consent_timeout(settings.consent_timeout());

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            cancel.cancel();
        }
    });

    let fetcher: Arc<dyn ResourceFetcher> = Arc::new(
        HttpFetcher::new(settings.request_timeout(), settings.user_agent.as_deref())
            .context("failed to build HTTP client")?,
    );

    let mut driver = match backend {
        Backend::Api => SearchDriver::Api(Arc::new(
            DuckDuckGoApi::new(settings.request_timeout(), &settings.region)
                .context("failed to build DuckDuckGo client")?,
        )),
        Backend::Browser { engine } => SearchDriver::Browser {
            engine,
            renderer: Box::new(ChromeRenderer::new(settings.browser.clone())),
        },
    };

    info!("Output directory: {}", ctx.output_dir.display());
    let engine = CrawlEngine::new(ctx, fetcher);
    let result = engine.run(&query, &mut driver).await;

    if let SearchDriver::Browser { renderer, .. } = &mut driver {
        renderer.close().await;
    }

    let report = result?;
    print_summary(&query, &report, &engine.context().output_dir);
    Ok(())
}

fn print_summary(query: &Query, report: &CrawlReport, output_dir: &std::path::Path) {
    println!();

    if report.termination == Termination::NoResults {
        println!("{} No results.", style("!").yellow());
        return;
    }

    println!(
        "{}",
        style(format!("Results for '{}' ({})", query.keyword(), report.backend)).bold()
    );
    for outcome in &report.outcomes {
        match (&outcome.local_path, &outcome.error) {
            (Some(path), _) => println!(
                "  {} {} -> {}",
                style("✓").green(),
                outcome.link.url,
                path.display()
            ),
            (None, Some(e)) => println!("  {} {} ({})", style("✗").red(), outcome.link.url, e),
            (None, None) => println!("  {} {}", style("→").cyan(), outcome.link.url),
        }
    }

    let marker = match report.termination {
        Termination::SearchFailed(_) | Termination::Cancelled => style("!").yellow(),
        _ => style("✓").green(),
    };
    println!(
        "\n{} {} link(s) from {} page(s), {} saved, {} failed ({})",
        marker,
        report.link_count(),
        report.pages,
        report.saved_count(),
        report.failed_count(),
        report.termination
    );
    if report.saved_count() > 0 {
        println!("  Saved under {}", style(output_dir.display()).cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchEngine;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["docsweep"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn keyword_is_required() {
        assert!(Cli::try_parse_from(["docsweep", "-l", "3"]).is_err());
    }

    #[test]
    fn zero_limit_means_default() {
        let cli = parse(&["-w", "test", "-l", "0"]);
        let query = cli.query(Backend::Api).unwrap();
        assert_eq!(query.limit(), 10);
    }

    #[test]
    fn non_integer_limit_is_rejected() {
        assert!(Cli::try_parse_from(["docsweep", "-w", "test", "-l", "ten"]).is_err());
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse(&["-w", "x"]).log_filter(), "docsweep=info");
        assert_eq!(parse(&["-w", "x", "-d", "10"]).log_filter(), "docsweep=debug");
        assert_eq!(parse(&["-w", "x", "-d", "30"]).log_filter(), "docsweep=warn");
        assert_eq!(parse(&["-w", "x", "-d", "50"]).log_filter(), "docsweep=error");
        assert_eq!(parse(&["-w", "x", "-v"]).log_filter(), "docsweep=debug");
        assert!(Cli::try_parse_from(["docsweep", "-w", "x", "-d", "15"]).is_err());
    }

    #[test]
    fn browser_backend_drops_unsupported_filetype() {
        let cli = parse(&["-w", "test", "-f", "xls", "-e", "google"]);
        let google = Backend::Browser {
            engine: SearchEngine::Google,
        };

        assert_eq!(cli.query(google).unwrap().filetype(), None);
        assert_eq!(cli.query(Backend::Api).unwrap().filetype(), Some("xls"));
    }

    #[test]
    fn flags_map_onto_query() {
        let cli = parse(&[
            "-w", "test", "-f", "pdf", "-s", "example.org", "-u", "docs", "-n",
        ]);
        let query = cli.query(Backend::Api).unwrap();

        assert_eq!(query.site(), Some("example.org"));
        assert_eq!(query.inurl(), Some("docs"));
        assert!(!query.download());
        assert_eq!(
            query.api_search_string(),
            "test filetype:pdf site:example.org inurl:docs"
        );
    }

    #[test]
    fn blank_keyword_is_rejected() {
        let cli = parse(&["-w", "   "]);
        assert!(cli.query(Backend::Api).is_err());
    }
}
