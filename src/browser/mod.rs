//! Page rendering capability.
//!
//! Rendered search engines are driven through [`PageRenderer`], a narrow
//! interface over one browser tab: load a URL, read back its HTML, click an
//! element. The crawl loop only ever talks to this trait, so tests can drive
//! it with a scripted fake. [`ChromeRenderer`] is the real implementation,
//! backed by chromiumoxide when the `browser` feature is enabled.

mod chrome;

pub use chrome::ChromeRenderer;

use std::time::Duration;

use async_trait::async_trait;

/// Error type for rendering operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {timeout:?} waiting for {selector}")]
    Timeout { selector: String, timeout: Duration },

    #[error("{0}")]
    Other(String),
}

/// A single rendering session (one tab).
///
/// The session is stateful: `content` and `click` act on whatever `navigate`
/// loaded last.
#[async_trait]
pub trait PageRenderer: Send {
    /// Load `url` and wait for it to render.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// HTML of the currently loaded page.
    async fn content(&mut self) -> Result<String, RenderError>;

    /// URL of the currently loaded page, after redirects.
    async fn current_url(&mut self) -> Option<String>;

    /// Wait up to `timeout` for the element matching the CSS `selector` to
    /// become interactable, then click it.
    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Release the session.
    async fn close(&mut self) {}
}
