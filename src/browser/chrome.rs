//! Chrome rendering session over the DevTools protocol.

#[cfg(feature = "browser")]
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::{PageRenderer, RenderError};
use crate::config::BrowserEngineConfig;
#[cfg(feature = "browser")]
use crate::fetcher::BROWSER_USER_AGENT;

/// Time given to late scripts after the load event.
#[cfg(feature = "browser")]
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How often `click` looks for its element again.
#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Chrome-backed [`PageRenderer`] holding one tab for the whole crawl.
#[cfg(feature = "browser")]
pub struct ChromeRenderer {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<tokio::task::JoinHandle<()>>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl ChromeRenderer {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Create a renderer. The browser is launched lazily on first use.
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler: None,
            remote: false,
        }
    }

    /// Find Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf, RenderError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(RenderError::Unavailable(
            "Chrome/Chromium not found. Install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    /// Launch or connect to the browser if not already running.
    async fn ensure_browser(&mut self) -> Result<(), RenderError> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(|e| {
            RenderError::Unavailable(format!("Failed to build browser config: {}", e))
        })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Unavailable(format!("Failed to launch browser: {}", e)))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);

        Ok(())
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&mut self, url: &str) -> Result<(), RenderError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let unavailable = |e: &dyn std::fmt::Display| {
            RenderError::Unavailable(format!("Failed to connect to remote browser: {}", e))
        };

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| unavailable(&e))?
            .json()
            .await
            .map_err(|e| unavailable(&e))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| unavailable(&"no webSocketDebuggerUrl in response"))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| unavailable(&e))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);
        self.remote = true;

        Ok(())
    }

    /// The crawl's tab, opened on first use.
    async fn ensure_page(&mut self) -> Result<&Page, RenderError> {
        if self.page.is_none() {
            self.ensure_browser().await?;
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| RenderError::Unavailable("browser not started".to_string()))?;

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Other(format!("Failed to open tab: {}", e)))?;

            page.execute(SetUserAgentOverrideParams::new(BROWSER_USER_AGENT.to_string()))
                .await
                .map_err(|e| RenderError::Other(format!("Failed to set user agent: {}", e)))?;

            self.page = Some(page);
        }

        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Unavailable("tab not open".to_string()))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let timeout = Duration::from_secs(self.config.timeout);
        let page = self.ensure_page().await?;

        info!("Navigating to {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}s", timeout.as_secs()),
                })
            }
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        let page = self.ensure_page().await?;
        page.content()
            .await
            .map_err(|e| RenderError::Other(format!("Failed to read page content: {}", e)))
    }

    async fn current_url(&mut self) -> Option<String> {
        let page = self.page.as_ref()?;
        page.url().await.ok().flatten()
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let page = self.ensure_page().await?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Ok(element) = page.find_element(selector).await {
                match element.click().await {
                    Ok(_) => {
                        debug!("Clicked {}", selector);
                        return Ok(());
                    }
                    Err(e) => debug!("{} not clickable yet: {}", selector, e),
                }
            }

            if Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            // Leave remote browsers running for whoever owns them.
            if !self.remote {
                let _ = browser.close().await;
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeRenderer {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromeRenderer {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    fn unavailable() -> RenderError {
        RenderError::Unavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        )
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
        Err(Self::unavailable())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Err(Self::unavailable())
    }

    async fn current_url(&mut self) -> Option<String> {
        None
    }

    async fn click(
        &mut self,
        _selector: &str,
        _timeout: std::time::Duration,
    ) -> Result<(), RenderError> {
        Err(Self::unavailable())
    }
}
