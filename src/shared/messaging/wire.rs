//! Wire Payloads
//!
//! JSON shapes exchanged with the chat backend, both over the push channel
//! and the request/response API. Field names follow the backend's documents
//! (`wa_id`, `msg_id`, `_id`, `fromSelf`, `clientId`).

use serde::{Deserialize, Serialize};

use super::conversation::ConversationId;
use super::message::{MessageStatus, RawTimestamp};

/// Push event name for new or redelivered messages
pub const EVENT_MESSAGE_NEW: &str = "message:new";
/// Push event name for status changes
pub const EVENT_MESSAGE_STATUS: &str = "message:status";

/// A message document as the backend sends it.
///
/// Used for `message:new` push payloads and for history records. Every
/// field is optional on the wire; normalization decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawMessageRecord {
    #[serde(rename = "wa_id", alias = "conversationId", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(rename = "msg_id", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,
    #[serde(rename = "fromSelf", default, skip_serializing_if = "Option::is_none")]
    pub from_self: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl RawMessageRecord {
    /// Server id: `msg_id` when present, otherwise the document `_id`
    pub fn backend_id(&self) -> Option<&str> {
        non_empty(self.msg_id.as_deref()).or_else(|| non_empty(self.document_id.as_deref()))
    }

    /// Conversation the record belongs to, if named
    pub fn conversation(&self) -> Option<ConversationId> {
        non_empty(self.conversation_id.as_deref()).map(ConversationId::from)
    }

    /// Known status; unknown strings count as absent
    pub fn known_status(&self) -> Option<MessageStatus> {
        self.status.as_deref().and_then(MessageStatus::parse)
    }

    /// Originating client tag, if any
    pub fn origin(&self) -> Option<&str> {
        non_empty(self.client_id.as_deref())
    }
}

/// `message:status` push payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusPayload {
    #[serde(rename = "wa_id", alias = "conversationId", default)]
    pub conversation_id: Option<String>,
    #[serde(rename = "msg_id", default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `POST /messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMessageRequest {
    #[serde(rename = "wa_id")]
    pub conversation_id: ConversationId,
    pub text: String,
    pub timestamp: RawTimestamp,
    #[serde(rename = "fromSelf")]
    pub from_self: bool,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Response of `POST /messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateMessageResponse {
    #[serde(rename = "msg_id", default)]
    pub msg_id: Option<String>,
    #[serde(rename = "_id", default)]
    pub document_id: Option<String>,
}

impl CreateMessageResponse {
    pub fn backend_id(&self) -> Option<&str> {
        non_empty(self.msg_id.as_deref()).or_else(|| non_empty(self.document_id.as_deref()))
    }
}

/// Body of `POST /delivered` and `POST /read`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetStatusRequest {
    pub msg_id: String,
    #[serde(rename = "wa_id")]
    pub conversation_id: ConversationId,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
