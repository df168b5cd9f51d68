//! Conversation Store
//!
//! In-memory map from conversation id to its metadata and ordered message
//! list. The store only performs pure state transitions; reconciliation
//! rules live in `client::reconciliation`.
//!
//! Every mutator upholds one invariant: within a conversation, no two
//! messages carry the same non-empty backend id.

use std::collections::{HashMap, HashSet};

use crate::shared::messaging::{Conversation, ConversationId, ConversationMeta, Message, MessagePatch};

/// Owned chat state for every known conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    /// Map of conversation ID to conversation
    conversations: HashMap<ConversationId, Conversation>,
    /// Chat list order
    order: Vec<ConversationId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with seed conversations, in the given order
    pub fn with_seed(seed: impl IntoIterator<Item = ConversationMeta>) -> Self {
        let mut store = Self::new();
        for meta in seed {
            store.upsert_conversation(meta);
        }
        store
    }

    /// Insert a conversation or merge metadata into an existing one.
    ///
    /// New conversations go to the end of the chat list. Returns `true`
    /// when the conversation was created.
    pub fn upsert_conversation(&mut self, meta: ConversationMeta) -> bool {
        match self.conversations.get_mut(&meta.id) {
            Some(existing) => {
                existing.merge_meta(meta);
                false
            }
            None => {
                self.order.push(meta.id.clone());
                self.conversations
                    .insert(meta.id.clone(), Conversation::from_meta(meta));
                true
            }
        }
    }

    /// Move a conversation to the top of the chat list
    pub fn move_to_front(&mut self, conversation_id: &ConversationId) {
        if let Some(pos) = self.order.iter().position(|id| id == conversation_id) {
            let id = self.order.remove(pos);
            self.order.insert(0, id);
        }
    }

    /// Append a message at the end of the conversation's list.
    ///
    /// No-op (returns `None`) when the conversation is unknown or the
    /// message's backend id is already present.
    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Option<usize> {
        let conversation = self.conversations.get_mut(conversation_id)?;
        if let Some(backend_id) = message.backend_id.as_deref() {
            if conversation.messages.iter().any(|m| m.has_backend_id(backend_id)) {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    backend_id,
                    "[STORE] Refusing to append duplicate backend id"
                );
                return None;
            }
        }
        conversation.messages.push(message);
        Some(conversation.messages.len() - 1)
    }

    /// Position of the message carrying `backend_id`
    pub fn find_message_index_by_backend_id(
        &self,
        conversation_id: &ConversationId,
        backend_id: &str,
    ) -> Option<usize> {
        self.conversations
            .get(conversation_id)?
            .messages
            .iter()
            .position(|m| m.has_backend_id(backend_id))
    }

    /// Shallow-merge fields into the message at `index`.
    ///
    /// Returns `true` when the message changed. A patch that would give the
    /// message a backend id already held by another message is refused.
    pub fn patch_message_at(
        &mut self,
        conversation_id: &ConversationId,
        index: usize,
        patch: MessagePatch,
    ) -> bool {
        let Some(conversation) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        if let Some(backend_id) = patch.backend_id.as_deref() {
            let taken = conversation
                .messages
                .iter()
                .enumerate()
                .any(|(i, m)| i != index && m.has_backend_id(backend_id));
            if taken {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    backend_id,
                    "[STORE] Refusing patch that would duplicate backend id"
                );
                return false;
            }
        }
        match conversation.messages.get_mut(index) {
            Some(message) => patch.apply_to(message),
            None => false,
        }
    }

    /// Replace the whole message list.
    ///
    /// Later entries repeating an earlier backend id are dropped. Returns
    /// the number of messages kept, or `None` for an unknown conversation.
    pub fn replace_messages(
        &mut self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) -> Option<usize> {
        let conversation = self.conversations.get_mut(conversation_id)?;
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(messages.len());
        for message in messages {
            if let Some(backend_id) = message.backend_id.as_deref() {
                if !seen.insert(backend_id.to_string()) {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        backend_id,
                        "[STORE] Dropping repeated backend id from replacement list"
                    );
                    continue;
                }
            }
            kept.push(message);
        }
        conversation.messages = kept;
        Some(conversation.messages.len())
    }

    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    pub(crate) fn conversation_mut(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Option<&mut Conversation> {
        self.conversations.get_mut(conversation_id)
    }

    pub fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    /// Conversations in chat list order
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.order.iter().filter_map(|id| self.conversations.get(id))
    }

    /// Cloned, ordered copy of every conversation for the view layer
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations().cloned().collect()
    }

    /// Locate a message by backend id across all conversations
    pub fn locate_backend_id(&self, backend_id: &str) -> Option<(ConversationId, usize)> {
        self.conversations().find_map(|conversation| {
            conversation
                .messages
                .iter()
                .position(|m| m.has_backend_id(backend_id))
                .map(|index| (conversation.id.clone(), index))
        })
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
