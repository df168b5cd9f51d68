//! # Message Reconciliation
//!
//! Merges the three sources of message state into one ordered,
//! de-duplicated list per conversation:
//!
//! - **Optimistic sends**: appended immediately, resolved later by an
//!   acknowledgment carrying the server id
//! - **Push events**: new messages and status changes, delivered at least
//!   once and in no particular order
//! - **History fetches**: the authoritative list, replacing local state
//!
//! Every handler is a deterministic function of (store, event) and runs to
//! completion without suspending. Nothing here fails: an event that cannot
//! be applied yields [`ReconcileOutcome::Dropped`] with the reason.
//!
//! ## Echo suppression
//!
//! Writes made by this session carry its [`ClientInstanceId`]. When the
//! push channel reflects such a write back, the event is dropped; the
//! acknowledgment of the initial request already resolved it.
//!
//! ## Acknowledgment matching
//!
//! Acknowledgments are matched to the most recent pending send by scanning
//! the list backwards. There is no per-request correlation id, so under
//! concurrent sends whose responses arrive out of order, ids can be
//! assigned to the wrong optimistic message.
//!
//! ## Usage
//!
//! ```rust
//! use chatsync::client::identity::ClientInstanceId;
//! use chatsync::client::reconciliation::{ReconcileOutcome, ReconciliationEngine};
//! use chatsync::client::store::ConversationStore;
//! use chatsync::shared::messaging::{ConversationId, ConversationMeta, DisplayClock};
//!
//! let chat = ConversationId::from("929967673820");
//! let store = ConversationStore::with_seed([ConversationMeta::placeholder(chat.clone())]);
//! let mut engine = ReconciliationEngine::new(ClientInstanceId::generate())
//!     .with_store(store)
//!     .with_clock(DisplayClock::utc());
//!
//! let sent = engine.optimistic_send(&chat, "hi", chrono::Utc::now());
//! assert_eq!(sent, ReconcileOutcome::Appended { index: 0 });
//! assert_eq!(engine.send_acknowledged(&chat, "m1"), ReconcileOutcome::Updated { index: 0 });
//! ```

use chrono::{DateTime, Utc};

use crate::client::identity::ClientInstanceId;
use crate::client::store::ConversationStore;
use crate::shared::messaging::{
    ConversationId, ConversationMeta, DisplayClock, Message, MessagePatch, MessageStatus,
    RawTimestamp, LAST_SEEN_JUST_NOW,
};

/// A pushed message, already normalized from its wire payload
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub conversation_id: ConversationId,
    pub backend_id: Option<String>,
    /// `None` keeps the stored text on redelivery
    pub text: Option<String>,
    pub timestamp: Option<RawTimestamp>,
    pub from_self: bool,
    /// `None` keeps the stored status on redelivery
    pub status: Option<MessageStatus>,
    /// Client instance that wrote the message, when the backend knows it
    pub origin: Option<ClientInstanceId>,
}

/// One entry of a fetched history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub backend_id: Option<String>,
    pub text: String,
    pub timestamp: Option<RawTimestamp>,
    pub from_self: bool,
    pub status: Option<MessageStatus>,
}

/// Inputs to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    OptimisticSend {
        conversation_id: ConversationId,
        text: String,
        now: DateTime<Utc>,
    },
    SendAcknowledged {
        conversation_id: ConversationId,
        backend_id: String,
    },
    PushNewMessage(IncomingMessage),
    PushStatusUpdate {
        conversation_id: ConversationId,
        backend_id: String,
        status: MessageStatus,
    },
    HistoryFetched {
        conversation_id: ConversationId,
        records: Vec<HistoryRecord>,
    },
}

impl SyncEvent {
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            SyncEvent::OptimisticSend {
                conversation_id, ..
            }
            | SyncEvent::SendAcknowledged {
                conversation_id, ..
            }
            | SyncEvent::PushStatusUpdate {
                conversation_id, ..
            }
            | SyncEvent::HistoryFetched {
                conversation_id, ..
            } => conversation_id,
            SyncEvent::PushNewMessage(message) => &message.conversation_id,
        }
    }
}

/// What a handler did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A message was appended at `index`
    Appended { index: usize },
    /// The message at `index` was updated in place
    Updated { index: usize },
    /// The whole list was replaced with `count` messages
    Replaced { count: usize },
    /// Nothing changed
    Dropped(DropReason),
}

impl ReconcileOutcome {
    /// Whether the store may have changed
    pub fn changed(&self) -> bool {
        !matches!(self, ReconcileOutcome::Dropped(_))
    }
}

/// Why an event left the store untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Push reflecting a write made by this session
    Echo,
    /// The conversation is not in the store
    UnknownConversation,
    /// No message with the referenced backend id exists locally
    UnknownTarget,
    /// Acknowledgment with no pending send left to resolve
    NoPendingSend,
    /// The backend id is already held by another message
    DuplicateBackendId,
    /// Acknowledgment or status update without a usable backend id
    MissingBackendId,
    /// Status would move backwards while forward-only mode is on
    StatusRegression,
}

/// Applies [`SyncEvent`]s to an owned [`ConversationStore`]
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    store: ConversationStore,
    client_id: ClientInstanceId,
    clock: DisplayClock,
    forward_only_status: bool,
}

impl ReconciliationEngine {
    /// Engine with an empty store, local-time rendering and unguarded
    /// status transitions
    pub fn new(client_id: ClientInstanceId) -> Self {
        Self {
            store: ConversationStore::new(),
            client_id,
            clock: DisplayClock::Local,
            forward_only_status: false,
        }
    }

    pub fn with_store(mut self, store: ConversationStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: DisplayClock) -> Self {
        self.clock = clock;
        self
    }

    /// Ignore status changes that move a message backwards
    pub fn forward_only_status(mut self, enabled: bool) -> Self {
        self.forward_only_status = enabled;
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    pub fn client_id(&self) -> &ClientInstanceId {
        &self.client_id
    }

    pub fn clock(&self) -> DisplayClock {
        self.clock
    }

    /// Dispatch an event to its handler
    pub fn apply(&mut self, event: SyncEvent) -> ReconcileOutcome {
        match event {
            SyncEvent::OptimisticSend {
                conversation_id,
                text,
                now,
            } => self.optimistic_send(&conversation_id, &text, now),
            SyncEvent::SendAcknowledged {
                conversation_id,
                backend_id,
            } => self.send_acknowledged(&conversation_id, &backend_id),
            SyncEvent::PushNewMessage(message) => self.push_new_message(message),
            SyncEvent::PushStatusUpdate {
                conversation_id,
                backend_id,
                status,
            } => self.push_status_update(&conversation_id, &backend_id, status),
            SyncEvent::HistoryFetched {
                conversation_id,
                records,
            } => self.history_fetched(&conversation_id, records),
        }
    }

    /// Append a locally-written message before the server has seen it
    pub fn optimistic_send(
        &mut self,
        conversation_id: &ConversationId,
        text: &str,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let message = Message::outgoing(text, self.clock.format(now));
        let Some(index) = self.store.append_message(conversation_id, message.clone()) else {
            tracing::debug!(conversation_id = %conversation_id, "[ENGINE] Optimistic send to unknown conversation");
            return ReconcileOutcome::Dropped(DropReason::UnknownConversation);
        };
        if let Some(conversation) = self.store.conversation_mut(conversation_id) {
            conversation.last_seen_text = LAST_SEEN_JUST_NOW.to_string();
            conversation.update_last_message(&message);
        }
        tracing::debug!(conversation_id = %conversation_id, index, "[ENGINE] Appended optimistic message");
        ReconcileOutcome::Appended { index }
    }

    /// Give the most recent pending send its server id
    pub fn send_acknowledged(
        &mut self,
        conversation_id: &ConversationId,
        backend_id: &str,
    ) -> ReconcileOutcome {
        if backend_id.is_empty() {
            return ReconcileOutcome::Dropped(DropReason::MissingBackendId);
        }
        let Some(conversation) = self.store.conversation(conversation_id) else {
            return ReconcileOutcome::Dropped(DropReason::UnknownConversation);
        };
        if conversation.messages.iter().any(|m| m.has_backend_id(backend_id)) {
            tracing::debug!(
                conversation_id = %conversation_id,
                backend_id,
                "[ENGINE] Acknowledged id already materialized"
            );
            return ReconcileOutcome::Dropped(DropReason::DuplicateBackendId);
        }
        let Some(index) = conversation.messages.iter().rposition(Message::is_pending) else {
            tracing::debug!(
                conversation_id = %conversation_id,
                backend_id,
                "[ENGINE] No pending send left for acknowledgment"
            );
            return ReconcileOutcome::Dropped(DropReason::NoPendingSend);
        };

        self.store
            .patch_message_at(conversation_id, index, MessagePatch::backend_id(backend_id));
        tracing::debug!(conversation_id = %conversation_id, backend_id, index, "[ENGINE] Resolved pending send");
        ReconcileOutcome::Updated { index }
    }

    /// Merge a pushed message: drop echoes, update redeliveries in place,
    /// append everything else
    pub fn push_new_message(&mut self, incoming: IncomingMessage) -> ReconcileOutcome {
        let conversation_id = incoming.conversation_id.clone();
        if incoming.origin.as_ref() == Some(&self.client_id) {
            tracing::debug!(conversation_id = %conversation_id, "[ENGINE] Dropping echo of own write");
            return ReconcileOutcome::Dropped(DropReason::Echo);
        }
        if !self.store.contains(&conversation_id) {
            tracing::warn!(conversation_id = %conversation_id, "[ENGINE] Push for unknown conversation dropped");
            return ReconcileOutcome::Dropped(DropReason::UnknownConversation);
        }

        let display_time = incoming
            .timestamp
            .as_ref()
            .and_then(|raw| self.clock.display_time(raw));
        let backend_id = incoming.backend_id.filter(|id| !id.is_empty());

        let existing = backend_id.as_deref().and_then(|id| {
            self.store
                .find_message_index_by_backend_id(&conversation_id, id)
        });

        let outcome = match existing {
            Some(index) => {
                let status = incoming.status.filter(|next| {
                    !(self.forward_only_status
                        && self
                            .store
                            .conversation(&conversation_id)
                            .and_then(|c| c.messages.get(index))
                            .is_some_and(|current| current.status.regresses_to(*next)))
                });
                let patch = MessagePatch {
                    text: incoming.text,
                    display_time,
                    from_self: Some(incoming.from_self),
                    status,
                    backend_id: None,
                };
                self.store.patch_message_at(&conversation_id, index, patch);
                tracing::debug!(conversation_id = %conversation_id, index, "[ENGINE] Updated redelivered message");
                ReconcileOutcome::Updated { index }
            }
            None => {
                let message = Message {
                    text: incoming.text.unwrap_or_default(),
                    display_time: display_time.unwrap_or_default(),
                    from_self: incoming.from_self,
                    status: incoming.status.unwrap_or_default(),
                    backend_id,
                };
                match self.store.append_message(&conversation_id, message) {
                    Some(index) => {
                        tracing::debug!(conversation_id = %conversation_id, index, "[ENGINE] Appended pushed message");
                        ReconcileOutcome::Appended { index }
                    }
                    None => ReconcileOutcome::Dropped(DropReason::UnknownConversation),
                }
            }
        };

        if let ReconcileOutcome::Appended { index } | ReconcileOutcome::Updated { index } = outcome {
            if let Some(conversation) = self.store.conversation_mut(&conversation_id) {
                if let Some(message) = conversation.messages.get(index).cloned() {
                    conversation.update_last_message(&message);
                }
            }
        }
        outcome
    }

    /// Set the status of an already materialized message
    pub fn push_status_update(
        &mut self,
        conversation_id: &ConversationId,
        backend_id: &str,
        status: MessageStatus,
    ) -> ReconcileOutcome {
        if backend_id.is_empty() {
            return ReconcileOutcome::Dropped(DropReason::MissingBackendId);
        }
        let Some(conversation) = self.store.conversation(conversation_id) else {
            return ReconcileOutcome::Dropped(DropReason::UnknownConversation);
        };
        let Some(index) = conversation
            .messages
            .iter()
            .position(|m| m.has_backend_id(backend_id))
        else {
            tracing::warn!(
                conversation_id = %conversation_id,
                backend_id,
                "[ENGINE] Status update for unknown message dropped"
            );
            return ReconcileOutcome::Dropped(DropReason::UnknownTarget);
        };

        let current = conversation.messages[index].status;
        if self.forward_only_status && current.regresses_to(status) {
            tracing::debug!(
                conversation_id = %conversation_id,
                backend_id,
                from = %current,
                to = %status,
                "[ENGINE] Ignoring status regression"
            );
            return ReconcileOutcome::Dropped(DropReason::StatusRegression);
        }

        self.store
            .patch_message_at(conversation_id, index, MessagePatch::status(status));
        ReconcileOutcome::Updated { index }
    }

    /// Replace the conversation's messages with the server's history
    pub fn history_fetched(
        &mut self,
        conversation_id: &ConversationId,
        records: Vec<HistoryRecord>,
    ) -> ReconcileOutcome {
        // Existing metadata is left alone; only the message list is replaced
        if !self.store.contains(conversation_id) {
            self.store
                .upsert_conversation(ConversationMeta::placeholder(conversation_id.clone()));
            tracing::info!(conversation_id = %conversation_id, "[ENGINE] Created conversation from history");
        }

        let messages = records
            .into_iter()
            .map(|record| Message {
                text: record.text,
                display_time: record
                    .timestamp
                    .as_ref()
                    .and_then(|raw| self.clock.display_time(raw))
                    .unwrap_or_default(),
                from_self: record.from_self,
                status: record.status.unwrap_or_default(),
                backend_id: record.backend_id.filter(|id| !id.is_empty()),
            })
            .collect();

        let count = self
            .store
            .replace_messages(conversation_id, messages)
            .unwrap_or_default();
        if let Some(conversation) = self.store.conversation_mut(conversation_id) {
            conversation.refresh_preview();
        }
        tracing::info!(conversation_id = %conversation_id, count, "[ENGINE] Applied history");
        ReconcileOutcome::Replaced { count }
    }
}
