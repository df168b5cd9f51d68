//! # Sync Coordinator
//!
//! Adapter between the outside world and the [`ReconciliationEngine`]:
//!
//! - user intents (select, send, status change, new chat) become an
//!   optimistic engine event plus an outbound request
//! - push frames are normalized and fed to the engine
//! - failures are published as [`SyncNotice`]s and returned; nothing is
//!   retried
//!
//! The engine sits behind a single lock that is only held while a handler
//! runs, never across a network call, so handlers apply one at a time in
//! the order their events are observed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatsync::client::config::Config;
//! use chatsync::client::identity::IdentityProvider;
//! use chatsync::client::sync::{push, SyncCoordinator};
//!
//! # async fn run() -> Result<(), chatsync::client::sync::SyncError> {
//! let config = Config::load()?;
//! let identity = IdentityProvider::ephemeral();
//! let coordinator = SyncCoordinator::connect(&config, &identity, Vec::new())?;
//!
//! let (deliveries, _task) = push::spawn_sse_subscription(&config)?;
//! coordinator.attach_push(deliveries)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod normalize;
pub mod push;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use api::{ChatApi, HttpChatApi};
pub use error::SyncError;
pub use normalize::PushEvent;
pub use push::{PushDelivery, PushFrame, SubscriptionStatus};

use crate::client::config::Config;
use crate::client::identity::{ClientInstanceId, IdentityProvider};
use crate::client::reconciliation::{ReconcileOutcome, ReconciliationEngine, SyncEvent};
use crate::client::store::ConversationStore;
use crate::shared::messaging::{
    default_avatar, Conversation, ConversationId, ConversationMeta, CreateMessageRequest,
    MessageStatus, RawTimestamp, LAST_SEEN_JUST_NOW,
};

/// Capacity of the notice channel
pub const NOTICE_BUFFER: usize = 64;

/// Text of the server-side placeholder written when a chat is started
pub const CHAT_STARTED_TEXT: &str = "Chat started";

/// Change notifications for the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// The conversation's metadata or messages changed
    ConversationChanged(ConversationId),
    SelectionChanged(Option<ConversationId>),
    /// A request failed; the state it would have produced did not happen
    NetworkError {
        operation: &'static str,
        message: String,
    },
    PushStatus(SubscriptionStatus),
}

/// Result of [`SyncCoordinator::send_text`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank after trimming; nothing was sent
    Empty,
    /// Inside the double-submit window; nothing was sent
    Debounced,
    /// Sent, and the pending message now carries this id
    Acknowledged(String),
    /// Sent, but the response carried no id; the message stays pending
    Unacknowledged,
}

/// Cheap-to-clone handle; all clones drive the same engine
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    engine: RwLock<ReconciliationEngine>,
    api: Arc<dyn ChatApi>,
    client_id: ClientInstanceId,
    selected: RwLock<Option<ConversationId>>,
    notices: broadcast::Sender<SyncNotice>,
    push_attached: AtomicBool,
    last_send: Mutex<Option<Instant>>,
    send_debounce: Duration,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("client_id", &self.inner.client_id)
            .field("push_attached", &self.inner.push_attached.load(Ordering::Relaxed))
            .field("send_debounce", &self.inner.send_debounce)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    pub fn new(engine: ReconciliationEngine, api: Arc<dyn ChatApi>, send_debounce: Duration) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        let client_id = engine.client_id().clone();
        Self {
            inner: Arc::new(Inner {
                engine: RwLock::new(engine),
                api,
                client_id,
                selected: RwLock::new(None),
                notices,
                push_attached: AtomicBool::new(false),
                last_send: Mutex::new(None),
                send_debounce,
            }),
        }
    }

    /// Build an engine from `config`, seed it, and talk to the configured
    /// backend over HTTP
    pub fn connect(
        config: &Config,
        identity: &IdentityProvider,
        seed: Vec<ConversationMeta>,
    ) -> Result<Self, SyncError> {
        let api = HttpChatApi::new(config.clone())?;
        let engine = ReconciliationEngine::new(identity.client_instance_id().clone())
            .with_store(ConversationStore::with_seed(seed))
            .with_clock(config.display_clock()?)
            .forward_only_status(config.forward_only_status());
        tracing::info!(
            client_id = %engine.client_id(),
            server = config.server_url(),
            "[SYNC] Coordinator ready"
        );
        Ok(Self::new(engine, Arc::new(api), config.send_debounce()))
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    pub fn client_instance_id(&self) -> &ClientInstanceId {
        &self.inner.client_id
    }

    /// Ordered copy of every conversation
    pub async fn snapshot(&self) -> Vec<Conversation> {
        self.inner.engine.read().await.store().snapshot()
    }

    pub async fn conversation(&self, conversation_id: &ConversationId) -> Option<Conversation> {
        self.inner
            .engine
            .read()
            .await
            .store()
            .conversation(conversation_id)
            .cloned()
    }

    pub async fn selected(&self) -> Option<ConversationId> {
        self.inner.selected.read().await.clone()
    }

    /// Consume push deliveries on a background task. Only one push channel
    /// may be attached per session.
    pub fn attach_push(
        &self,
        mut deliveries: mpsc::Receiver<PushDelivery>,
    ) -> Result<JoinHandle<()>, SyncError> {
        if self.inner.push_attached.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadySubscribed);
        }
        let coordinator = self.clone();
        Ok(tokio::spawn(async move {
            while let Some(delivery) = deliveries.recv().await {
                match delivery {
                    PushDelivery::Frame(frame) => {
                        // Malformed frames are logged by apply_push_frame
                        let _ = coordinator.apply_push_frame(&frame).await;
                    }
                    PushDelivery::Status(status) => {
                        coordinator.notify(SyncNotice::PushStatus(status));
                    }
                }
            }
            tracing::debug!("[SYNC] Push channel closed");
        }))
    }

    /// Normalize one push frame and apply it. `Ok(None)` means the event
    /// name is not one this client handles.
    pub async fn apply_push_frame(
        &self,
        frame: &PushFrame,
    ) -> Result<Option<ReconcileOutcome>, SyncError> {
        match PushEvent::decode(&frame.event, &frame.data) {
            Ok(Some(event)) => Ok(Some(self.apply(event.into()).await)),
            Ok(None) => {
                tracing::debug!(event = %frame.event, "[SYNC] Ignoring push event");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(event = %frame.event, "[SYNC] Discarding push frame: {}", e);
                Err(e)
            }
        }
    }

    /// Select a conversation and resync it from the server's history.
    ///
    /// The response is applied to the conversation it was requested for,
    /// even if the selection moved on in the meantime.
    pub async fn select_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ReconcileOutcome, SyncError> {
        *self.inner.selected.write().await = Some(conversation_id.clone());
        self.notify(SyncNotice::SelectionChanged(Some(conversation_id.clone())));

        let records = self
            .inner
            .api
            .history(conversation_id)
            .await
            .map_err(|e| self.report(e))?;
        let records = records.into_iter().map(normalize::history_record).collect();

        Ok(self
            .apply(SyncEvent::HistoryFetched {
                conversation_id: conversation_id.clone(),
                records,
            })
            .await)
    }

    pub async fn clear_selection(&self) {
        *self.inner.selected.write().await = None;
        self.notify(SyncNotice::SelectionChanged(None));
    }

    /// Send `text` to a conversation: optimistic append, create request,
    /// then acknowledgment.
    ///
    /// On failure the optimistic message stays pending.
    pub async fn send_text(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<SendOutcome, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Empty);
        }
        if !self.inner.engine.read().await.store().contains(conversation_id) {
            return Err(SyncError::UnknownConversation(conversation_id.clone()));
        }
        if !self.accept_send().await {
            tracing::debug!(conversation_id = %conversation_id, "[SYNC] Send debounced");
            return Ok(SendOutcome::Debounced);
        }

        let now = Utc::now();
        self.apply(SyncEvent::OptimisticSend {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            now,
        })
        .await;

        let request = self.create_request(conversation_id, text, now);
        let backend_id = self
            .inner
            .api
            .create_message(&request)
            .await
            .map_err(|e| self.report(e))?;

        match backend_id {
            Some(backend_id) => {
                self.apply(SyncEvent::SendAcknowledged {
                    conversation_id: conversation_id.clone(),
                    backend_id: backend_id.clone(),
                })
                .await;
                Ok(SendOutcome::Acknowledged(backend_id))
            }
            None => {
                tracing::warn!(conversation_id = %conversation_id, "[SYNC] Create response carried no message id");
                Ok(SendOutcome::Unacknowledged)
            }
        }
    }

    /// Change a message's status: applied locally first, then sent to the
    /// server. The local change is not rolled back if the request fails.
    pub async fn request_status_change(
        &self,
        backend_id: &str,
        status: MessageStatus,
    ) -> Result<(), SyncError> {
        let located = self
            .inner
            .engine
            .read()
            .await
            .store()
            .locate_backend_id(backend_id);
        let Some((conversation_id, _)) = located else {
            tracing::warn!(backend_id, "[SYNC] Status change for unknown message");
            return Err(SyncError::UnknownTarget {
                backend_id: backend_id.to_string(),
            });
        };

        self.apply(SyncEvent::PushStatusUpdate {
            conversation_id: conversation_id.clone(),
            backend_id: backend_id.to_string(),
            status,
        })
        .await;

        self.inner
            .api
            .set_status(backend_id, &conversation_id, status)
            .await
            .map_err(|e| self.report(e))
    }

    /// Mark the newest acknowledged message of ours with `status`; returns
    /// its backend id
    pub async fn mark_last_own(
        &self,
        conversation_id: &ConversationId,
        status: MessageStatus,
    ) -> Result<String, SyncError> {
        let backend_id = {
            let engine = self.inner.engine.read().await;
            let conversation = engine
                .store()
                .conversation(conversation_id)
                .ok_or_else(|| SyncError::UnknownConversation(conversation_id.clone()))?;
            conversation
                .last_acknowledged_own()
                .and_then(|m| m.backend_id.clone())
                .ok_or_else(|| SyncError::NoAcknowledgedMessage(conversation_id.clone()))?
        };
        self.request_status_change(&backend_id, status).await?;
        Ok(backend_id)
    }

    /// Create (or refresh) a chat, move it to the top and select it.
    ///
    /// The id is the digits of `number`, or the current epoch milliseconds
    /// when there are none. A "Chat started" placeholder is written to the
    /// server but not shown locally; if that write fails the chat still
    /// exists locally.
    pub async fn start_new_conversation(
        &self,
        name: &str,
        number: &str,
    ) -> Result<ConversationId, SyncError> {
        let now = Utc::now();
        let conversation_id =
            ConversationId::from_phone_number(number).unwrap_or_else(|| ConversationId::generated(now));
        let name = name.trim();
        let display_name = if name.is_empty() {
            conversation_id.to_string()
        } else {
            name.to_string()
        };
        let meta = ConversationMeta::new(conversation_id.clone())
            .with_display_name(display_name)
            .with_avatar(default_avatar(&conversation_id))
            .with_last_seen(LAST_SEEN_JUST_NOW);

        {
            let mut engine = self.inner.engine.write().await;
            let store = engine.store_mut();
            store.upsert_conversation(meta);
            store.move_to_front(&conversation_id);
        }
        tracing::info!(conversation_id = %conversation_id, "[SYNC] Started conversation");
        self.notify(SyncNotice::ConversationChanged(conversation_id.clone()));

        if let Err(e) = self.select_conversation(&conversation_id).await {
            tracing::debug!(conversation_id = %conversation_id, "[SYNC] Initial history fetch failed: {}", e);
        }

        let placeholder = self.create_request(&conversation_id, CHAT_STARTED_TEXT, now);
        if let Err(e) = self.inner.api.create_message(&placeholder).await {
            self.report(e);
        }
        Ok(conversation_id)
    }

    async fn apply(&self, event: SyncEvent) -> ReconcileOutcome {
        let conversation_id = event.conversation_id().clone();
        let outcome = self.inner.engine.write().await.apply(event);
        if outcome.changed() {
            self.notify(SyncNotice::ConversationChanged(conversation_id));
        }
        outcome
    }

    async fn accept_send(&self) -> bool {
        let mut last_send = self.inner.last_send.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last_send {
            if now.duration_since(previous) < self.inner.send_debounce {
                return false;
            }
        }
        *last_send = Some(now);
        true
    }

    fn create_request(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        now: chrono::DateTime<Utc>,
    ) -> CreateMessageRequest {
        CreateMessageRequest {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            timestamp: RawTimestamp::from(now),
            from_self: true,
            client_id: self.inner.client_id.to_string(),
        }
    }

    /// Publish a failure to the view layer and hand the error back
    fn report(&self, error: SyncError) -> SyncError {
        tracing::warn!("[SYNC] {}", error);
        if let SyncError::TransientNetwork { operation, message } = &error {
            self.notify(SyncNotice::NetworkError {
                operation: *operation,
                message: message.clone(),
            });
        }
        error
    }

    fn notify(&self, notice: SyncNotice) {
        if let Err(e) = self.inner.notices.send(notice) {
            tracing::trace!("[SYNC] No notice subscribers: {:?}", e.0);
        }
    }
}
