//! HTTP API tests
//!
//! Exercises `HttpChatApi` against wiremock: request shapes, response
//! decoding and the status endpoint fallback.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatsync::client::sync::{ChatApi, SyncError};
use chatsync::shared::messaging::{ConversationId, CreateMessageRequest, MessageStatus, RawTimestamp};

use crate::common::{message_doc, MockBackend};

fn create_request(text: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        conversation_id: ConversationId::from("929967673820"),
        text: text.to_string(),
        timestamp: RawTimestamp::Text("2024-03-01T10:15:00.000Z".to_string()),
        from_self: true,
        client_id: "test-session".to_string(),
    }
}

#[tokio::test]
async fn test_create_message_posts_wire_fields() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "wa_id": "929967673820",
            "text": "hi",
            "fromSelf": true,
            "clientId": "test-session",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"msg_id": "wamid.1"})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let id = backend.api().create_message(&create_request("hi")).await.unwrap();
    assert_eq!(id.as_deref(), Some("wamid.1"));
}

#[tokio::test]
async fn test_create_message_falls_back_to_document_id() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "65f0"})))
        .mount(&backend.server)
        .await;

    let id = backend.api().create_message(&create_request("hi")).await.unwrap();
    assert_eq!(id.as_deref(), Some("65f0"));
}

#[tokio::test]
async fn test_create_message_server_error_is_transient() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&backend.server)
        .await;

    let err = backend.api().create_message(&create_request("hi")).await.unwrap_err();
    assert_matches!(&err, SyncError::TransientNetwork { operation: "create-message", message } if message.contains("db down"));
}

#[tokio::test]
async fn test_history_decodes_records_in_order() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/929967673820"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message_doc("929967673820", "m1", "first", false),
            message_doc("929967673820", "m2", "second", true),
        ])))
        .mount(&backend.server)
        .await;

    let records = backend
        .api()
        .history(&ConversationId::from("929967673820"))
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().filter_map(|r| r.backend_id()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(records[1].from_self, Some(true));
}

#[tokio::test]
async fn test_history_non_array_is_empty() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/929967673820"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .mount(&backend.server)
        .await;

    let records = backend
        .api()
        .history(&ConversationId::from("929967673820"))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_set_status_uses_primary_endpoint() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/read"))
        .and(body_json(json!({"msg_id": "m1", "wa_id": "929967673820"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages/m1/read"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend.server)
        .await;

    backend
        .api()
        .set_status("m1", &ConversationId::from("929967673820"), MessageStatus::Read)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_status_falls_back_to_message_route() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .and(path("/delivered"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages/m1/delivered"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;

    backend
        .api()
        .set_status("m1", &ConversationId::from("929967673820"), MessageStatus::Delivered)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_status_both_routes_failing() {
    let backend = MockBackend::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&backend.server)
        .await;

    let err = backend
        .api()
        .set_status("m1", &ConversationId::from("929967673820"), MessageStatus::Read)
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
