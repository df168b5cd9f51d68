//! Chat Message Data Structure
//!
//! Represents a single entry in a conversation's ordered message list, plus
//! the timestamp and status vocabulary shared with the backend.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::SharedError;

/// Delivery status of a message.
///
/// Variants are declared in lifecycle order, so `Ord` reflects the
/// `sent -> delivered -> read` progression.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Accepted locally or by the server, not yet delivered
    #[default]
    Sent,
    /// Delivered to the recipient's device
    Delivered,
    /// Read by the recipient
    Read,
}

impl MessageStatus {
    /// Wire representation (`sent`, `delivered`, `read`)
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Lenient parse used for push payloads: unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` goes backwards in the lifecycle.
    pub fn regresses_to(self, next: MessageStatus) -> bool {
        next < self
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageStatus::parse(s)
            .ok_or_else(|| SharedError::validation("status", format!("unknown status '{}'", s)))
    }
}

/// Timestamp exactly as the backend sent it.
///
/// The backend emits ISO-8601 strings, but epoch milliseconds are accepted
/// as well since older documents carry them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Milliseconds since the Unix epoch
    Millis(i64),
    /// Fractional milliseconds since the Unix epoch
    FractionalMillis(f64),
    /// RFC 3339 / ISO-8601 text
    Text(String),
}

impl RawTimestamp {
    /// Parse into a UTC instant. Returns `None` for unparseable input.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            RawTimestamp::FractionalMillis(ms) if ms.is_finite() => {
                Utc.timestamp_millis_opt(ms.trunc() as i64).single()
            }
            RawTimestamp::FractionalMillis(_) => None,
            RawTimestamp::Text(text) => parse_text_timestamp(text),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        RawTimestamp::Text(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    // Zone-less ISO strings are treated as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    text.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Time zone used to render `HH:MM` display times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayClock {
    /// The host's local time zone
    #[default]
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl DisplayClock {
    /// UTC clock, mostly useful for deterministic rendering
    pub fn utc() -> Self {
        DisplayClock::Fixed(Utc.fix())
    }

    /// Build from an optional offset in minutes east of UTC.
    pub fn from_offset_minutes(minutes: Option<i32>) -> Result<Self, SharedError> {
        match minutes {
            None => Ok(DisplayClock::Local),
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(DisplayClock::Fixed)
                .ok_or_else(|| {
                    SharedError::validation(
                        "display_utc_offset_minutes",
                        format!("offset {} is out of range", minutes),
                    )
                }),
        }
    }

    /// Format an instant as `HH:MM`.
    pub fn format(&self, at: DateTime<Utc>) -> String {
        match self {
            DisplayClock::Local => at.with_timezone(&Local).format("%H:%M").to_string(),
            DisplayClock::Fixed(offset) => at.with_timezone(offset).format("%H:%M").to_string(),
        }
    }

    /// Format a raw backend timestamp, if it can be parsed.
    pub fn display_time(&self, raw: &RawTimestamp) -> Option<String> {
        raw.to_utc().map(|at| self.format(at))
    }
}

/// Represents a chat message as held by the conversation store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Message text
    pub text: String,
    /// Rendered `HH:MM` time
    pub display_time: String,
    /// Whether this client's user wrote the message
    pub from_self: bool,
    /// Delivery status
    pub status: MessageStatus,
    /// Server-assigned id; absent while an optimistic send is unacknowledged
    pub backend_id: Option<String>,
}

impl Message {
    /// Create a locally-originated message awaiting acknowledgment
    pub fn outgoing(text: impl Into<String>, display_time: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            display_time: display_time.into(),
            from_self: true,
            status: MessageStatus::Sent,
            backend_id: None,
        }
    }

    /// A locally-originated message the server has not acknowledged yet
    pub fn is_pending(&self) -> bool {
        self.from_self && self.backend_id.is_none()
    }

    /// Whether this message carries the given server id
    pub fn has_backend_id(&self, backend_id: &str) -> bool {
        self.backend_id.as_deref() == Some(backend_id)
    }
}

/// Shallow set of field updates for a stored [`Message`].
///
/// `None` leaves the corresponding field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub display_time: Option<String>,
    pub from_self: Option<bool>,
    pub status: Option<MessageStatus>,
    pub backend_id: Option<String>,
}

impl MessagePatch {
    /// Patch that only sets the status
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only sets the backend id
    pub fn backend_id(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: Some(backend_id.into()),
            ..Self::default()
        }
    }

    /// Apply onto a message, returning whether anything changed
    pub fn apply_to(self, message: &mut Message) -> bool {
        let before = message.clone();
        if let Some(text) = self.text {
            message.text = text;
        }
        if let Some(display_time) = self.display_time {
            message.display_time = display_time;
        }
        if let Some(from_self) = self.from_self {
            message.from_self = from_self;
        }
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(backend_id) = self.backend_id {
            message.backend_id = Some(backend_id);
        }
        *message != before
    }
}
