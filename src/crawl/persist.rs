//! Persisting the links of one result page.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::{CrawlContext, FetchOutcome, OutcomeError};
use crate::fetcher::ResourceFetcher;
use crate::search::ResultLink;
use crate::storage::{map_url_to_path, persist_resource};

/// Fetch and store every link of a page, or only list them.
///
/// Downloads run concurrently (at most `ctx.workers` at a time) but outcomes
/// come back in link order. `processed` is bumped as each link completes.
///
/// Distinct URLs can map to the same file (the host and query string are not
/// part of the path). The first such link on a page keeps the file. Later ones
/// are not fetched and are reported as [`OutcomeError::PathTaken`].
pub(super) async fn persist_links(
    fetcher: &dyn ResourceFetcher,
    ctx: &CrawlContext,
    fallback_name: &str,
    links: Vec<ResultLink>,
    download: bool,
    processed: &AtomicUsize,
) -> Vec<FetchOutcome> {
    if !download {
        return links
            .into_iter()
            .map(|link| {
                info!("Entry: {}", link.url);
                processed.fetch_add(1, Ordering::SeqCst);
                FetchOutcome::listed(link)
            })
            .collect();
    }

    stream::iter(claim_paths(ctx, fallback_name, links))
        .map(|(link, claim)| async move {
            match claim {
                Claim::Owned => persist_one(fetcher, ctx, fallback_name, link, processed).await,
                Claim::Taken { path, taken_by } => {
                    warn!(
                        "{} maps to {}, already used by {}; skipping",
                        link.url,
                        path.display(),
                        taken_by
                    );
                    processed.fetch_add(1, Ordering::SeqCst);
                    FetchOutcome::failed(link, OutcomeError::PathTaken { path, taken_by })
                }
            }
        })
        .buffered(ctx.workers.max(1))
        .collect()
        .await
}

enum Claim {
    Owned,
    Taken { path: PathBuf, taken_by: String },
}

/// Assign each mapped file to the first link of the page that maps to it.
///
/// Repeats of the same URL fetch the same bytes and are not collisions.
fn claim_paths(
    ctx: &CrawlContext,
    fallback_name: &str,
    links: Vec<ResultLink>,
) -> Vec<(ResultLink, Claim)> {
    let mut owners: HashMap<PathBuf, String> = HashMap::new();

    links
        .into_iter()
        .map(|link| {
            let path = map_url_to_path(&ctx.output_dir, &link.url, fallback_name).file_path();
            let claim = match owners.get(&path) {
                Some(owner) if *owner != link.url => Claim::Taken {
                    path,
                    taken_by: owner.clone(),
                },
                Some(_) => Claim::Owned,
                None => {
                    owners.insert(path, link.url.clone());
                    Claim::Owned
                }
            };
            (link, claim)
        })
        .collect()
}

async fn persist_one(
    fetcher: &dyn ResourceFetcher,
    ctx: &CrawlContext,
    fallback_name: &str,
    link: ResultLink,
    processed: &AtomicUsize,
) -> FetchOutcome {
    let outcome = match fetcher.fetch(&link.url).await {
        Ok(content) => {
            match persist_resource(&ctx.output_dir, &link.url, fallback_name, &content).await {
                Ok(path) => {
                    debug!("Resource saved to {}", path.display());
                    FetchOutcome::saved(link, path)
                }
                Err(source) => {
                    let path = map_url_to_path(&ctx.output_dir, &link.url, fallback_name).file_path();
                    warn!("Unable to save {}: {}", path.display(), source);
                    FetchOutcome::failed(link, OutcomeError::Write { path, source })
                }
            }
        }
        Err(e) => {
            warn!("Unable to retrieve {}: {}", link.url, e.cause);
            FetchOutcome::failed(link, e.into())
        }
    };

    processed.fetch_add(1, Ordering::SeqCst);
    outcome
}
