//! Search query model and builder.
//!
//! A [`Query`] is validated once by [`QueryBuilder::build`] and never changes
//! afterwards. It knows how to render itself as an API search string
//! (`keyword filetype:X site:Y inurl:Z`) and as a browser search URL.

use std::path::{Path, PathBuf};

use crate::search::SearchEngine;
use crate::storage::sanitize_segment;

/// Number of results fetched when no limit (or a zero limit) is given.
pub const DEFAULT_LIMIT: usize = 10;

/// File types the rendered search engines accept in a `filetype:` filter.
pub const BROWSER_FILETYPES: &[&str] = &["doc", "pdf", "docx"];

/// Output directory name for keywords with no usable characters (such as `..`).
const FALLBACK_DIR: &str = "results";

/// Log levels accepted by `--debug`.
pub const LOG_LEVELS: &[u8] = &[0, 10, 20, 30, 40, 50];

/// Fatal configuration problems, detected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("a search keyword is mandatory")]
    MissingKeyword,

    #[error("limit is not an integer: {0}")]
    InvalidLimit(String),

    #[error("log level must be one of 0, 10, 20, 30, 40 or 50 (got {0})")]
    InvalidLogLevel(String),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("invalid settings: {0}")]
    Settings(String),
}

/// An immutable keyword query with optional filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    keyword: String,
    site: Option<String>,
    inurl: Option<String>,
    filetype: Option<String>,
    limit: usize,
    download: bool,
}

impl Query {
    /// Start building a query for `keyword`.
    pub fn builder(keyword: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(keyword)
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn inurl(&self) -> Option<&str> {
        self.inurl.as_deref()
    }

    pub fn filetype(&self) -> Option<&str> {
        self.filetype.as_deref()
    }

    /// Maximum number of result links the crawl may yield.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether resources are retrieved, or only listed.
    pub fn download(&self) -> bool {
        self.download
    }

    /// Search string for structured search APIs.
    pub fn api_search_string(&self) -> String {
        let mut parts = vec![self.keyword.clone()];

        if let Some(ref ft) = self.filetype {
            parts.push(format!("filetype:{}", ft));
        }
        if let Some(ref site) = self.site {
            parts.push(format!("site:{}", site));
        }
        if let Some(ref inurl) = self.inurl {
            parts.push(format!("inurl:{}", inurl));
        }

        parts.join(" ")
    }

    /// First-page URL for a rendered search engine.
    ///
    /// The keyword is quoted (double quotes for Google, single quotes for
    /// Yahoo) and qualifiers are appended with `+`.
    pub fn browser_search_url(&self, engine: SearchEngine) -> String {
        let keyword = urlencoding::encode(&self.keyword);
        let mut url = match engine {
            SearchEngine::Google => {
                format!("https://www.google.com/search?q=%22{}%22", keyword)
            }
            SearchEngine::Yahoo => format!("https://search.yahoo.com/search?p=%27{}%27", keyword),
        };

        if let Some(ref site) = self.site {
            url.push_str(&format!("+site:{}", urlencoding::encode(site)));
        }
        if let Some(ref ft) = self.filetype {
            url.push_str(&format!("+filetype:{}", urlencoding::encode(ft)));
        }
        if let Some(ref inurl) = self.inurl {
            url.push_str(&format!("+inurl:{}", urlencoding::encode(inurl)));
        }

        url
    }

    /// Directory downloaded resources are written under.
    ///
    /// The keyword is always the last component: `<base>/<keyword>`, or just
    /// `<keyword>` (relative to the working directory) without a base. It is
    /// cleaned like a URL path segment, so it always stays a single directory
    /// below the base.
    pub fn output_root(&self, base: Option<&Path>) -> PathBuf {
        let dir = sanitize_segment(&self.keyword).unwrap_or_else(|| FALLBACK_DIR.to_string());
        match base {
            Some(base) => base.join(dir),
            None => PathBuf::from(dir),
        }
    }
}

/// Builder for [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    keyword: String,
    site: Option<String>,
    inurl: Option<String>,
    filetype: Option<String>,
    limit: usize,
    download: bool,
}

impl QueryBuilder {
    /// Create a new builder with the default limit and downloading enabled.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            site: None,
            inurl: None,
            filetype: None,
            limit: DEFAULT_LIMIT,
            download: true,
        }
    }

    /// Restrict results to a domain.
    pub fn site(mut self, site: &str) -> Self {
        self.site = non_empty(site);
        self
    }

    /// Restrict results to URLs containing a path fragment.
    pub fn inurl(mut self, inurl: &str) -> Self {
        self.inurl = non_empty(inurl);
        self
    }

    /// Filter by file type.
    pub fn filetype(mut self, ext: &str) -> Self {
        self.filetype = non_empty(ext.trim_start_matches('.'));
        self
    }

    /// Maximum number of results. Zero means the default (one page).
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        self
    }

    /// Whether to retrieve resources or only list them.
    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Validate and build the query.
    pub fn build(self) -> Result<Query, ConfigError> {
        let keyword = self.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(ConfigError::MissingKeyword);
        }

        Ok(Query {
            keyword,
            site: self.site,
            inurl: self.inurl,
            filetype: self.filetype,
            limit: self.limit,
            download: self.download,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a result limit from the command line.
pub fn parse_limit(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidLimit(value.to_string()))
}

/// Parse a numeric log level (0, 10, 20, 30, 40, 50).
pub fn parse_log_level(value: &str) -> Result<u8, ConfigError> {
    match value.trim().parse::<u8>() {
        Ok(level) if LOG_LEVELS.contains(&level) => Ok(level),
        _ => Err(ConfigError::InvalidLogLevel(value.to_string())),
    }
}

/// Whether a rendered search engine understands this `filetype:` value.
pub fn browser_filetype_allowed(filetype: &str) -> bool {
    BROWSER_FILETYPES.contains(&filetype.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_query() -> Query {
        Query::builder("test")
            .filetype("pdf")
            .site("example.org")
            .inurl("download")
            .limit(3)
            .build()
            .unwrap()
    }

    #[test]
    fn api_search_string_orders_qualifiers() {
        assert_eq!(
            full_query().api_search_string(),
            "test filetype:pdf site:example.org inurl:download"
        );
    }

    #[test]
    fn api_search_string_keyword_only() {
        let query = Query::builder("mkultra").build().unwrap();
        assert_eq!(query.api_search_string(), "mkultra");
    }

    #[test]
    fn google_url_quotes_keyword() {
        let url = full_query().browser_search_url(SearchEngine::Google);
        assert_eq!(
            url,
            "https://www.google.com/search?q=%22test%22+site:example.org+filetype:pdf+inurl:download"
        );
    }

    #[test]
    fn yahoo_url_single_quotes_keyword() {
        let query = Query::builder("annual report").build().unwrap();
        assert_eq!(
            query.browser_search_url(SearchEngine::Yahoo),
            "https://search.yahoo.com/search?p=%27annual%20report%27"
        );
    }

    #[test]
    fn missing_keyword_is_config_error() {
        assert_eq!(
            Query::builder("   ").build().unwrap_err(),
            ConfigError::MissingKeyword
        );
    }

    #[test]
    fn zero_limit_means_default() {
        let query = Query::builder("kw").limit(0).build().unwrap();
        assert_eq!(query.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn empty_filters_are_dropped() {
        let query = Query::builder("kw").site("").filetype(".pdf").build().unwrap();
        assert_eq!(query.site(), None);
        assert_eq!(query.filetype(), Some("pdf"));
    }

    #[test]
    fn limit_parsing() {
        assert_eq!(parse_limit("25"), Ok(25));
        assert_eq!(
            parse_limit("ten"),
            Err(ConfigError::InvalidLimit("ten".to_string()))
        );
    }

    #[test]
    fn log_level_parsing() {
        assert_eq!(parse_log_level("10"), Ok(10));
        assert!(parse_log_level("15").is_err());
        assert!(parse_log_level("debug").is_err());
    }

    #[test]
    fn output_root_appends_keyword() {
        let query = Query::builder("kw").build().unwrap();
        assert_eq!(query.output_root(None), PathBuf::from("kw"));
        assert_eq!(
            query.output_root(Some(Path::new("out"))),
            PathBuf::from("out/kw")
        );
    }

    #[test]
    fn output_root_stays_below_base() {
        let base = Path::new("out");

        let absolute = Query::builder("/etc/passwd").build().unwrap();
        assert_eq!(absolute.output_root(Some(base)), PathBuf::from("out/_etc_passwd"));

        let parent = Query::builder("..").build().unwrap();
        assert_eq!(parent.output_root(Some(base)), PathBuf::from("out/results"));

        let nested = Query::builder("../../tmp").build().unwrap();
        let root = nested.output_root(Some(base));
        assert_eq!(root.parent(), Some(base));
        assert_eq!(root, PathBuf::from("out/.._.._tmp"));
    }

    #[test]
    fn browser_filetypes() {
        assert!(browser_filetype_allowed("PDF"));
        assert!(browser_filetype_allowed("docx"));
        assert!(!browser_filetype_allowed("xls"));
    }
}
