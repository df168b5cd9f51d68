//! Messaging Module
//!
//! Data structures for the chat domain:
//!
//! - `Message` - one entry in a conversation's ordered list
//! - `Conversation` - a contact's metadata plus its messages
//! - `wire` - JSON payloads used by the push channel and the HTTP API
//!
//! # Usage
//!
//! ```rust
//! use chatsync::shared::messaging::{ConversationId, Message, MessageStatus};
//!
//! let id = ConversationId::from_phone_number("+91 99673 73820").unwrap();
//! let message = Message::outgoing("hi", "10:00");
//! assert_eq!(message.status, MessageStatus::Sent);
//! assert_eq!(id.as_str(), "919967373820");
//! ```

pub mod conversation;
pub mod message;
pub mod wire;

pub use conversation::{
    default_avatar, Conversation, ConversationId, ConversationMeta, AVATAR_BASE_URL,
    LAST_SEEN_JUST_NOW,
};
pub use message::{DisplayClock, Message, MessagePatch, MessageStatus, RawTimestamp};
pub use wire::{
    CreateMessageRequest, CreateMessageResponse, RawMessageRecord, SetStatusRequest,
    StatusPayload, EVENT_MESSAGE_NEW, EVENT_MESSAGE_STATUS,
};
