//! Chat Client Module
//!
//! Client-side state and synchronization for the chat list and message
//! threads.
//!
//! # Architecture
//!
//! ```text
//! client/
//! ├── mod.rs            - Module exports and documentation
//! ├── main.rs           - Terminal client entry point (binary)
//! ├── config.rs         - Config file + environment layering
//! ├── identity.rs       - Per-session client instance id
//! ├── store.rs          - Conversation store
//! ├── reconciliation.rs - Reconciliation engine
//! └── sync/             - Sync coordinator, HTTP API, SSE push channel
//! ```
//!
//! Data flows in one direction: intents and push frames go through
//! [`sync::SyncCoordinator`], which turns them into
//! [`reconciliation::SyncEvent`]s; the engine mutates its
//! [`store::ConversationStore`]; views read snapshots.

pub mod config;
pub mod identity;
pub mod reconciliation;
pub mod store;
pub mod sync;

pub use config::Config;
pub use identity::{ClientInstanceId, IdentityProvider};
pub use reconciliation::{ReconcileOutcome, ReconciliationEngine, SyncEvent};
pub use store::ConversationStore;
pub use sync::{SyncCoordinator, SyncError, SyncNotice};
