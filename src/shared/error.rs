//! Shared Error Types
//!
//! Errors raised while validating the data types in `shared`.
//!
//! # Error Categories
//!
//! - `ValidationError` - a field holds a value the client cannot use
//!
//! # Usage
//!
//! ```rust
//! use chatsync::shared::error::SharedError;
//!
//! let error = SharedError::validation("status", "unknown status 'seen'");
//! assert!(error.to_string().contains("status"));
//! ```
use thiserror::Error;

/// Errors produced by the shared data types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
