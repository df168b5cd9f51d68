//! Sync Error Types
//!
//! Nothing the coordinator reports is fatal: every variant means "state did
//! not update" and leaves it to the view layer whether to tell the user.

use thiserror::Error;

use crate::shared::config::ConfigError;
use crate::shared::messaging::ConversationId;

/// Errors surfaced by the sync coordinator and its channels
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Request/response call failed, timed out or was rejected
    #[error("network error during {operation}: {message}")]
    TransientNetwork {
        operation: &'static str,
        message: String,
    },

    /// A status change or lookup referenced a backend id not held locally
    #[error("unknown message '{backend_id}'")]
    UnknownTarget { backend_id: String },

    /// Push payload missing required fields or not decodable
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// The conversation is not in the store
    #[error("unknown conversation '{0}'")]
    UnknownConversation(ConversationId),

    /// The push channel was already attached for this session
    #[error("push channel already subscribed")]
    AlreadySubscribed,

    /// An intent needed a selected conversation and there is none
    #[error("no conversation selected")]
    NoConversationSelected,

    /// No own message has been acknowledged by the server yet
    #[error("no acknowledged message of ours in '{0}' yet")]
    NoAcknowledgedMessage(ConversationId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub fn network(operation: &'static str, message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            operation,
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::TransientNetwork { .. })
    }
}
