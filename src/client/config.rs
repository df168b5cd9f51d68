//! Runtime configuration
//!
//! Layers defaults, an optional TOML file and environment variables into
//! the [`AppConfig`] the client runs with.

use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::identity::default_session_file;
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use crate::shared::messaging::DisplayClock;

/// Path of an explicit config file
pub const CONFIG_PATH_ENV: &str = "CHATSYNC_CONFIG";
/// Overrides `server_url`
pub const SERVER_URL_ENV: &str = "CHATSYNC_SERVER_URL";
/// Overrides `push_path`
pub const PUSH_PATH_ENV: &str = "CHATSYNC_PUSH_PATH";

/// Application configuration wrapper.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            app: builder.build()?,
        })
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        Ok(Self { app })
    }

    /// Load defaults, then the config file, then environment overrides.
    ///
    /// The file is `$CHATSYNC_CONFIG` when set, otherwise
    /// `<config_dir>/chatsync/config.toml` if it exists.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit.or_else(|| default_config_file().filter(|p| p.exists()));
        match path {
            Some(path) => Self::load_from(&path),
            None => {
                let mut app = AppConfig::default();
                apply_env(&mut app);
                Self::from_app(app)
            }
        }
    }

    /// Load a specific file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        let mut app = AppConfig::from_toml_str(&text)?;
        apply_env(&mut app);
        tracing::debug!(path = %path.display(), "[CONFIG] Loaded config file");
        Self::from_app(app)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.trim_end_matches('/')
    }

    /// Get the full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    /// URL built from percent-encoded path segments under the server URL
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        let mut url = Url::parse(self.server_url())
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url(), e)))?;
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(self.server_url().to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of the push (SSE) endpoint
    pub fn push_url(&self) -> Result<Url, ConfigError> {
        let raw = self.api_url(&self.app.push_path);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.app.request_timeout_ms)
    }

    pub fn send_debounce(&self) -> Duration {
        Duration::from_millis(self.app.send_debounce_ms)
    }

    pub fn display_clock(&self) -> Result<DisplayClock, ConfigError> {
        DisplayClock::from_offset_minutes(self.app.display_utc_offset_minutes).map_err(|e| {
            ConfigError::InvalidValue {
                field: "display_utc_offset_minutes",
                message: e.to_string(),
            }
        })
    }

    pub fn forward_only_status(&self) -> bool {
        self.app.forward_only_status
    }

    /// Session id file, when persistence is enabled and a location exists
    pub fn session_file(&self) -> Option<PathBuf> {
        if self.app.persist_session_id {
            default_session_file()
        } else {
            None
        }
    }
}

/// Platform location of the config file
pub fn default_config_file() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("chatsync");
    path.push("config.toml");
    Some(path)
}

fn apply_env(app: &mut AppConfig) {
    if let Ok(url) = std::env::var(SERVER_URL_ENV) {
        if !url.trim().is_empty() {
            app.server_url = url;
        }
    }
    if let Ok(path) = std::env::var(PUSH_PATH_ENV) {
        if !path.trim().is_empty() {
            app.push_path = path;
        }
    }
}
