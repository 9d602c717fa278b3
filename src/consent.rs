//! Cookie-consent dismissal for rendered search engines.
//!
//! Both engines may put a consent wall in front of the first result page.
//! The handler clicks the engine's accept button once, before page 1 is read.
//! It is best effort: if the button never shows up (no wall, or already
//! dismissed in this browser profile) the crawl simply carries on.

use std::time::Duration;

use tracing::debug;

use crate::browser::{PageRenderer, RenderError};
use crate::search::SearchEngine;

/// How long to wait for the consent control by default.
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(5);

/// The consent control did not become interactable in time.
#[derive(Debug, thiserror::Error)]
#[error("consent control {selector} not handled within {timeout:?}: {reason}")]
pub struct ConsentTimeout {
    pub selector: String,
    pub timeout: Duration,
    pub reason: String,
}

/// Dismisses the consent prompt of a rendered search engine.
#[derive(Debug, Clone, Copy)]
pub struct ConsentHandler {
    timeout: Duration,
}

impl Default for ConsentHandler {
    fn default() -> Self {
        Self::new(DEFAULT_CONSENT_TIMEOUT)
    }
}

impl ConsentHandler {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// CSS locator of the engine's accept button.
    pub fn selector(engine: SearchEngine) -> &'static str {
        match engine {
            SearchEngine::Yahoo => r#"button[name="agree"]"#,
            SearchEngine::Google => "button#L2AGLb",
        }
    }

    /// Click the accept button on the currently loaded page.
    pub async fn handle<R>(&self, renderer: &mut R, engine: SearchEngine) -> Result<(), ConsentTimeout>
    where
        R: PageRenderer + ?Sized,
    {
        let selector = Self::selector(engine);
        debug!("Waiting up to {:?} for consent control {}", self.timeout, selector);

        match renderer.click(selector, self.timeout).await {
            Ok(()) => {
                debug!("Consent accepted on {}", engine);
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    RenderError::Timeout { .. } => "not found".to_string(),
                    other => other.to_string(),
                };
                Err(ConsentTimeout {
                    selector: selector.to_string(),
                    timeout: self.timeout,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ClickRecorder {
        clickable: bool,
        clicked: Vec<String>,
    }

    #[async_trait]
    impl PageRenderer for ClickRecorder {
        async fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String, RenderError> {
            Ok(String::new())
        }

        async fn current_url(&mut self) -> Option<String> {
            None
        }

        async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
            if self.clickable {
                self.clicked.push(selector.to_string());
                Ok(())
            } else {
                Err(RenderError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                })
            }
        }
    }

    #[tokio::test]
    async fn clicks_engine_specific_button() {
        let mut renderer = ClickRecorder {
            clickable: true,
            clicked: Vec::new(),
        };
        ConsentHandler::default()
            .handle(&mut renderer, SearchEngine::Google)
            .await
            .unwrap();
        ConsentHandler::default()
            .handle(&mut renderer, SearchEngine::Yahoo)
            .await
            .unwrap();

        assert_eq!(
            renderer.clicked,
            vec!["button#L2AGLb".to_string(), r#"button[name="agree"]"#.to_string()]
        );
    }

    #[tokio::test]
    async fn missing_button_is_timeout() {
        let mut renderer = ClickRecorder {
            clickable: false,
            clicked: Vec::new(),
        };
        let err = ConsentHandler::new(Duration::from_millis(10))
            .handle(&mut renderer, SearchEngine::Yahoo)
            .await
            .unwrap_err();

        assert_eq!(err.selector, r#"button[name="agree"]"#);
        assert_eq!(err.timeout, Duration::from_millis(10));
    }
}
