//! Mock backend helpers for integration tests
//!
//! Wraps a wiremock server and a client configuration pointing at it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use chatsync::client::config::Config;
use chatsync::client::sync::{HttpChatApi, SyncCoordinator};
use chatsync::shared::config::AppConfig;

use super::fixtures::test_engine;

/// A running mock backend and the config that targets it
pub struct MockBackend {
    pub server: MockServer,
    pub config: Config,
}

impl MockBackend {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let config = Config::with_builder(
            AppConfig::builder()
                .server_url(server.uri())
                .request_timeout_ms(2_000)
                .send_debounce_ms(0)
                .display_utc_offset_minutes(0),
        )
        .expect("mock server uri is a valid url");
        Self { server, config }
    }

    pub fn api(&self) -> HttpChatApi {
        HttpChatApi::new(self.config.clone()).expect("http client builds")
    }

    /// Coordinator over the seeded test engine, talking to this server
    pub fn coordinator(&self) -> SyncCoordinator {
        SyncCoordinator::new(test_engine(), Arc::new(self.api()), Duration::ZERO)
    }
}

/// A stored message document as the backend returns it
pub fn message_doc(conversation_id: &str, msg_id: &str, text: &str, from_self: bool) -> Value {
    json!({
        "_id": format!("doc-{}", msg_id),
        "wa_id": conversation_id,
        "msg_id": msg_id,
        "text": text,
        "timestamp": "2024-03-01T10:15:00Z",
        "fromSelf": from_self,
    })
}

/// Body of an SSE response carrying the given `(event, data)` frames
pub fn sse_body(frames: &[(&str, Value)]) -> String {
    frames
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}
