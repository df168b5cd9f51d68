//! Conversation Data Structure
//!
//! Represents a conversation with one contact: its display metadata and the
//! ordered list of messages exchanged so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::Message;

/// Avatar service used when a conversation has no explicit avatar
pub const AVATAR_BASE_URL: &str = "https://i.pravatar.cc/150?u=";

/// Last-seen text shown right after local activity
pub const LAST_SEEN_JUST_NOW: &str = "Last seen just now";

/// Stable key of a conversation (normally a normalized phone number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Normalize a phone number by keeping only its digits.
    ///
    /// Returns `None` when the input has no digits at all.
    pub fn from_phone_number(number: &str) -> Option<Self> {
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    /// Fallback id derived from the creation instant (epoch milliseconds)
    pub fn generated(now: DateTime<Utc>) -> Self {
        Self(now.timestamp_millis().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Default avatar reference for a conversation id
pub fn default_avatar(id: &ConversationId) -> String {
    format!("{}{}", AVATAR_BASE_URL, id)
}

/// Conversation metadata without messages.
///
/// Empty strings mean "unknown"; merging never replaces a known value with
/// an unknown one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: ConversationId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_ref: String,
    #[serde(default)]
    pub last_seen_text: String,
    #[serde(default)]
    pub last_message_preview: String,
    #[serde(default)]
    pub last_activity_time: String,
}

impl ConversationMeta {
    /// Metadata carrying only the id
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            display_name: String::new(),
            avatar_ref: String::new(),
            last_seen_text: String::new(),
            last_message_preview: String::new(),
            last_activity_time: String::new(),
        }
    }

    /// Metadata for a conversation first seen through its id alone.
    /// Name falls back to the id and the avatar to the default service.
    pub fn placeholder(id: ConversationId) -> Self {
        let avatar_ref = default_avatar(&id);
        Self {
            display_name: id.to_string(),
            avatar_ref,
            ..Self::new(id)
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = avatar_ref.into();
        self
    }

    pub fn with_last_seen(mut self, last_seen: impl Into<String>) -> Self {
        self.last_seen_text = last_seen.into();
        self
    }
}

/// Represents a conversation and its ordered message list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation key
    pub id: ConversationId,
    /// Contact name shown in the chat list
    pub display_name: String,
    /// Avatar URL or other reference
    pub avatar_ref: String,
    /// Presence text ("Last seen ...")
    pub last_seen_text: String,
    /// Messages in arrival/creation order (never re-sorted by timestamp)
    pub messages: Vec<Message>,
    /// Text of the latest message, for the chat list
    pub last_message_preview: String,
    /// Display time of the latest message, for the chat list
    pub last_activity_time: String,
}

impl Conversation {
    /// Create an empty conversation from metadata
    pub fn from_meta(meta: ConversationMeta) -> Self {
        Self {
            id: meta.id,
            display_name: meta.display_name,
            avatar_ref: meta.avatar_ref,
            last_seen_text: meta.last_seen_text,
            messages: Vec::new(),
            last_message_preview: meta.last_message_preview,
            last_activity_time: meta.last_activity_time,
        }
    }

    /// Merge metadata, keeping existing values wherever the update is empty
    pub fn merge_meta(&mut self, meta: ConversationMeta) {
        fn merge(slot: &mut String, incoming: String) {
            if !incoming.is_empty() {
                *slot = incoming;
            }
        }
        merge(&mut self.display_name, meta.display_name);
        merge(&mut self.avatar_ref, meta.avatar_ref);
        merge(&mut self.last_seen_text, meta.last_seen_text);
        merge(&mut self.last_message_preview, meta.last_message_preview);
        merge(&mut self.last_activity_time, meta.last_activity_time);
    }

    /// Point the preview fields at the given message
    pub fn update_last_message(&mut self, message: &Message) {
        self.last_message_preview = message.text.clone();
        self.last_activity_time = message.display_time.clone();
    }

    /// Refresh the preview from the tail of the list; keeps the old preview
    /// when the list is empty
    pub fn refresh_preview(&mut self) {
        if let Some(last) = self.messages.last().cloned() {
            self.update_last_message(&last);
        }
    }

    /// Latest message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Latest message written by this user that the server has acknowledged
    pub fn last_acknowledged_own(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.from_self && m.backend_id.is_some())
    }

    /// Number of locally-originated messages still waiting for an id
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }
}
