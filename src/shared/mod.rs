//! Shared Module
//!
//! Types and data structures that describe chat state and the payloads
//! exchanged with the backend. Nothing in here performs I/O; the client
//! engine in `client` builds on these types.

/// Application configuration
pub mod config;

/// Shared error types
pub mod error;

/// Conversations, messages and wire payloads
pub mod messaging;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
