//! Payload normalization
//!
//! Turns raw backend documents into the engine's event types. This is the
//! only place that decides which wire fields are required.

use crate::client::identity::ClientInstanceId;
use crate::client::reconciliation::{HistoryRecord, IncomingMessage, SyncEvent};
use crate::client::sync::error::SyncError;
use crate::shared::messaging::{
    ConversationId, MessageStatus, RawMessageRecord, StatusPayload, EVENT_MESSAGE_NEW,
    EVENT_MESSAGE_STATUS,
};

/// Event name SSE uses when a frame has no `event:` line
const DEFAULT_SSE_EVENT: &str = "message";

/// A decoded push event
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NewMessage(IncomingMessage),
    StatusUpdate {
        conversation_id: ConversationId,
        backend_id: String,
        status: MessageStatus,
    },
}

impl PushEvent {
    /// Decode a push frame.
    ///
    /// Returns `Ok(None)` for event names this client does not handle.
    pub fn decode(event: &str, data: &str) -> Result<Option<Self>, SyncError> {
        match event {
            EVENT_MESSAGE_NEW | DEFAULT_SSE_EVENT => {
                let record: RawMessageRecord = serde_json::from_str(data)
                    .map_err(|e| SyncError::malformed(format!("{}: {}", EVENT_MESSAGE_NEW, e)))?;
                incoming_message(record).map(|m| Some(PushEvent::NewMessage(m)))
            }
            EVENT_MESSAGE_STATUS => {
                let payload: StatusPayload = serde_json::from_str(data)
                    .map_err(|e| SyncError::malformed(format!("{}: {}", EVENT_MESSAGE_STATUS, e)))?;
                status_update(payload).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            PushEvent::NewMessage(message) => &message.conversation_id,
            PushEvent::StatusUpdate {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

impl From<PushEvent> for SyncEvent {
    fn from(event: PushEvent) -> Self {
        match event {
            PushEvent::NewMessage(message) => SyncEvent::PushNewMessage(message),
            PushEvent::StatusUpdate {
                conversation_id,
                backend_id,
                status,
            } => SyncEvent::PushStatusUpdate {
                conversation_id,
                backend_id,
                status,
            },
        }
    }
}

/// Normalize a `message:new` payload; the conversation id is required
pub fn incoming_message(record: RawMessageRecord) -> Result<IncomingMessage, SyncError> {
    let conversation_id = record
        .conversation()
        .ok_or_else(|| SyncError::malformed("message:new without wa_id"))?;
    Ok(IncomingMessage {
        backend_id: record.backend_id().map(str::to_string),
        status: record.known_status(),
        origin: record.origin().map(ClientInstanceId::from),
        conversation_id,
        text: record.text,
        timestamp: record.timestamp,
        from_self: record.from_self.unwrap_or(false),
    })
}

/// Normalize a `message:status` payload; all three fields are required
pub fn status_update(payload: StatusPayload) -> Result<PushEvent, SyncError> {
    let conversation_id = payload
        .conversation_id
        .filter(|id| !id.is_empty())
        .map(ConversationId::from)
        .ok_or_else(|| SyncError::malformed("message:status without wa_id"))?;
    let backend_id = payload
        .msg_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::malformed("message:status without msg_id"))?;
    let raw_status = payload
        .status
        .ok_or_else(|| SyncError::malformed("message:status without status"))?;
    let status = MessageStatus::parse(&raw_status)
        .ok_or_else(|| SyncError::malformed(format!("unknown status '{}'", raw_status)))?;
    Ok(PushEvent::StatusUpdate {
        conversation_id,
        backend_id,
        status,
    })
}

/// Normalize one history entry
pub fn history_record(record: RawMessageRecord) -> HistoryRecord {
    HistoryRecord {
        backend_id: record.backend_id().map(str::to_string),
        status: record.known_status(),
        text: record.text.unwrap_or_default(),
        timestamp: record.timestamp,
        from_self: record.from_self.unwrap_or(false),
    }
}
