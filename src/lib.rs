//! chatsync - Chat Client Sync Library
//!
//! Keeps a chat client's conversation list and message threads consistent
//! while messages arrive from three independent sources: the client's own
//! optimistic sends, a server push channel, and on-demand history fetches.
//!
//! # Module Structure
//!
//! - **`shared`** - Types that cross the wire
//!   - Messages, conversations, push and API payloads
//!   - Configuration values and validation
//!   - Error types
//!
//! - **`client`** - The client engine
//!   - Identity provider (per-session client instance id)
//!   - Conversation store
//!   - Reconciliation engine (optimistic sends, acks, push, history)
//!   - Sync coordinator (HTTP API via reqwest, SSE push channel)
//!
//! # Usage
//!
//! ```rust,no_run
//! use chatsync::client::{Config, IdentityProvider, SyncCoordinator};
//! use chatsync::shared::messaging::ConversationId;
//!
//! # async fn example() -> Result<(), chatsync::client::SyncError> {
//! let config = Config::load()?;
//! let identity = IdentityProvider::ephemeral();
//! let sync = SyncCoordinator::connect(&config, &identity, Vec::new())?;
//!
//! let chat = ConversationId::from("929967673820");
//! sync.select_conversation(&chat).await?;
//! sync.send_text(&chat, "hi").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The engine is a plain single-owner value. `SyncCoordinator` wraps it in
//! `Arc<RwLock<>>`, holds the write lock only while a handler runs, and
//! publishes changes on a `broadcast::Sender`.

/// Shared types and data structures
pub mod shared;

/// Client engine and sync coordinator
pub mod client;
