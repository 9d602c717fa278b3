//! Mapping resource URLs onto the output directory.
//!
//! A resource at `https://host/a/b/report.pdf` is stored as
//! `{output_root}/a/b/report.pdf`. The host is dropped, the query string and
//! fragment are ignored, and a URL ending in `/` is stored under the fallback
//! name (the search keyword).

use std::path::{Path, PathBuf};

use tracing::debug;

/// Longest file or directory name written to disk, in characters.
const MAX_SEGMENT_LEN: usize = 200;

/// Where a resource is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    pub directory: PathBuf,
    pub file_name: String,
}

impl ResourcePath {
    /// Full path of the file.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Derive the directory and filename for `url` under `base`.
///
/// Pure string transform: nothing is checked or created on disk.
pub fn map_url_to_path(base: &Path, url: &str, fallback_name: &str) -> ResourcePath {
    let segments = url_path_segments(url);

    let (last, dirs) = match segments.split_last() {
        Some((last, dirs)) => (last.as_str(), dirs),
        None => ("", &[][..]),
    };

    let mut directory = base.to_path_buf();
    for segment in dirs.iter().filter_map(|s| sanitize_segment(s)) {
        directory.push(segment);
    }

    let file_name = sanitize_segment(last)
        .unwrap_or_else(|| sanitize_segment(fallback_name).unwrap_or_else(|| "index".to_string()));

    ResourcePath {
        directory,
        file_name,
    }
}

/// Write `content` to the location mapped from `url`, creating directories.
///
/// Directory creation is idempotent, so concurrent writers of different files
/// under the same directory need no coordination.
pub async fn persist_resource(
    base: &Path,
    url: &str,
    fallback_name: &str,
    content: &[u8],
) -> std::io::Result<PathBuf> {
    let target = map_url_to_path(base, url, fallback_name);
    tokio::fs::create_dir_all(&target.directory).await?;

    let path = target.file_path();
    debug!("Saving {}", path.display());
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Decoded path segments of a URL, excluding the host.
///
/// The final element is the (possibly empty) last segment.
fn url_path_segments(url: &str) -> Vec<String> {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            return segments.map(decode_segment).collect();
        }
        return vec![String::new()];
    }

    // Unparseable: strip "scheme://host" by hand and drop query/fragment.
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let path = rest.split_once('/').map(|(_, p)| p).unwrap_or("");
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.split('/').map(decode_segment).collect()
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Make a single path component safe; `None` if nothing usable is left.
pub(crate) fn sanitize_segment(segment: &str) -> Option<String> {
    let sanitized: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_SEGMENT_LEN)
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        None
    } else {
        Some(trimmed.to_string())
    }
}
