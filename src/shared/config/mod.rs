//! Application configuration module
//!
//! Provides the configuration values the client needs, a builder, and TOML
//! decoding. Runtime layering (file + environment) lives in
//! `client::config`.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default backend URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5001";
/// Default SSE endpoint path
pub const DEFAULT_PUSH_PATH: &str = "/events";
/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Window in which a second send is treated as an accidental double submit
pub const DEFAULT_SEND_DEBOUNCE_MS: u64 = 250;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend base URL
    pub server_url: String,
    /// Path of the push (SSE) endpoint, relative to `server_url`
    pub push_path: String,
    /// Timeout for request/response calls
    pub request_timeout_ms: u64,
    /// Double-submit guard for sends
    pub send_debounce_ms: u64,
    /// Offset used for HH:MM rendering; `None` means the local time zone
    pub display_utc_offset_minutes: Option<i32>,
    /// Ignore status updates that move a message backwards
    pub forward_only_status: bool,
    /// Keep the client instance id in a session file
    pub persist_session_id: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            push_path: DEFAULT_PUSH_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            send_debounce_ms: DEFAULT_SEND_DEBOUNCE_MS,
            display_utc_offset_minutes: None,
            forward_only_status: false,
            persist_session_id: false,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Decode from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| ConfigError::InvalidFile(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("server_url"));
        }
        let url = Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if !self.push_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "push_path",
                message: format!("'{}' must start with '/'", self.push_path),
            });
        }
        if let Some(minutes) = self.display_utc_offset_minutes {
            if minutes.abs() >= 24 * 60 {
                return Err(ConfigError::InvalidValue {
                    field: "display_utc_offset_minutes",
                    message: format!("{} is not a valid UTC offset", minutes),
                });
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn push_path(mut self, path: impl Into<String>) -> Self {
        self.config.push_path = path.into();
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn send_debounce_ms(mut self, ms: u64) -> Self {
        self.config.send_debounce_ms = ms;
        self
    }

    pub fn display_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.config.display_utc_offset_minutes = Some(minutes);
        self
    }

    pub fn forward_only_status(mut self, enabled: bool) -> Self {
        self.config.forward_only_status = enabled;
        self
    }

    pub fn persist_session_id(mut self, enabled: bool) -> Self {
        self.config.persist_session_id = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("invalid config file: {0}")]
    InvalidFile(String),
}
