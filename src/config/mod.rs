//! Configuration for docsweep.
//!
//! Settings come from three layers, later ones winning: the TOML file
//! (`--config`, or `docsweep.toml` in the working directory), environment
//! variables, and finally command-line flags (applied by the CLI).

pub mod browser;

pub use browser::BrowserEngineConfig;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consent::DEFAULT_CONSENT_TIMEOUT;
use crate::crawl::DEFAULT_WORKERS;
use crate::query::ConfigError;
use crate::search::duckduckgo::DEFAULT_REGION;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "docsweep.toml";

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base directory for downloads. The keyword is appended to it.
    pub output_dir: Option<PathBuf>,
    /// Backend used when `--engine` is not given.
    pub backend: String,
    /// Concurrent downloads within one result page.
    pub workers: usize,
    /// HTTP timeout for searches and downloads, in seconds.
    pub request_timeout_secs: u64,
    /// Explicit User-Agent, or "browser" for the desktop Chrome one.
    pub user_agent: Option<String>,
    pub consent_timeout_secs: u64,
    /// Pause between result pages of a rendered engine.
    pub page_delay_ms: u64,
    /// DuckDuckGo region code.
    pub region: String,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: None,
            backend: "api".to_string(),
            workers: DEFAULT_WORKERS,
            request_timeout_secs: 30,
            user_agent: None,
            consent_timeout_secs: DEFAULT_CONSENT_TIMEOUT.as_secs(),
            page_delay_ms: 0,
            region: DEFAULT_REGION.to_string(),
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `docsweep.toml` if it exists.
    ///
    /// An explicitly named file must exist. Environment overrides are applied
    /// on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.with_env_overrides()
    }

    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings = Self::from_toml(&raw)
            .map_err(|e| ConfigError::Settings(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply environment variable overrides.
    ///
    /// - `DOCSWEEP_OUTPUT_DIR` - base output directory
    /// - `DOCSWEEP_WORKERS` - concurrent downloads
    /// - `DOCSWEEP_USER_AGENT` - User-Agent header
    /// - browser variables, see [`BrowserEngineConfig::with_env_overrides`]
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(dir) = env_value("DOCSWEEP_OUTPUT_DIR") {
            debug!("Using DOCSWEEP_OUTPUT_DIR from environment: {}", dir);
            self.output_dir = Some(PathBuf::from(dir));
        }

        if let Some(workers) = env_value("DOCSWEEP_WORKERS") {
            self.workers = workers.parse().map_err(|_| {
                ConfigError::Settings(format!("DOCSWEEP_WORKERS is not a number: {}", workers))
            })?;
        }

        if let Some(agent) = env_value("DOCSWEEP_USER_AGENT") {
            self.user_agent = Some(agent);
        }

        self.browser = self.browser.with_env_overrides();
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.backend, "api");
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.consent_timeout(), Duration::from_secs(5));
        assert_eq!(settings.page_delay(), Duration::ZERO);
        assert_eq!(settings.region, "wt-wt");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            workers = 8
            output_dir = "/tmp/docs"

            [browser]
            headless = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.workers, 8);
        assert_eq!(settings.output_dir, Some(PathBuf::from("/tmp/docs")));
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.timeout, 30);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"yahoo\"\npage_delay_ms = 250").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.backend, "yahoo");
        assert_eq!(settings.page_delay(), Duration::from_millis(250));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::from_file(Path::new("/nonexistent/docsweep.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(Settings::from_toml("workers = \"many\"").is_err());
    }
}
