//! docsweep - keyword search, result pagination and document retrieval.
//!
//! A query is run against either a structured search API (DuckDuckGo) or a
//! rendered search engine (Google, Yahoo) driven through Chrome. Result pages
//! are followed until a limit is reached, and every yielded link is fetched
//! and written under a directory tree mirroring its URL path.

pub mod browser;
pub mod cli;
pub mod config;
pub mod consent;
pub mod crawl;
pub mod fetcher;
pub mod query;
pub mod search;
pub mod storage;
