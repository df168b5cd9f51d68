//! Engine and payload fixtures

use chatsync::client::identity::ClientInstanceId;
use chatsync::client::reconciliation::{IncomingMessage, ReconciliationEngine};
use chatsync::client::store::ConversationStore;
use chatsync::shared::messaging::{ConversationId, ConversationMeta, DisplayClock, RawTimestamp};

/// Client id used by every test session
pub const TEST_CLIENT_ID: &str = "test-session";

pub fn dedew() -> ConversationId {
    ConversationId::from("929967673820")
}

pub fn ravi() -> ConversationId {
    ConversationId::from("919937320320")
}

pub fn seed() -> Vec<ConversationMeta> {
    vec![
        ConversationMeta::placeholder(dedew()).with_display_name("dedew"),
        ConversationMeta::placeholder(ravi()).with_display_name("Ravi"),
    ]
}

/// Engine over the seeded store, rendering times in UTC
pub fn test_engine() -> ReconciliationEngine {
    ReconciliationEngine::new(ClientInstanceId::from(TEST_CLIENT_ID))
        .with_store(ConversationStore::with_seed(seed()))
        .with_clock(DisplayClock::utc())
}

pub fn incoming(conversation_id: ConversationId, backend_id: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        conversation_id,
        backend_id: Some(backend_id.to_string()),
        text: Some(text.to_string()),
        timestamp: Some(RawTimestamp::Text("2024-03-01T10:15:00Z".to_string())),
        from_self: false,
        status: None,
        origin: None,
    }
}
