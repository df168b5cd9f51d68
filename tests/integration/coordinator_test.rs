//! Coordinator flow tests
//!
//! Drives `SyncCoordinator` end to end against a mock backend.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatsync::client::reconciliation::ReconcileOutcome;
use chatsync::client::sync::{PushFrame, SendOutcome, SyncError, SyncNotice};
use chatsync::shared::messaging::MessageStatus;

use crate::common::{dedew, message_doc, ravi, MockBackend, TEST_CLIENT_ID};

#[tokio::test]
async fn test_select_send_push_status_flow() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/929967673820"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message_doc("929967673820", "h1", "older", false),
        ])))
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"clientId": TEST_CLIENT_ID, "text": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg_id": "m1"})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let sync = backend.coordinator();

    let outcome = sync.select_conversation(&dedew()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Replaced { count: 1 });
    assert_eq!(sync.conversation(&dedew()).await.unwrap().display_name, "dedew");

    let sent = sync.send_text(&dedew(), "hi").await.unwrap();
    assert_eq!(sent, SendOutcome::Acknowledged("m1".to_string()));

    // Echo of our own write
    let echo = json!({
        "wa_id": "929967673820", "msg_id": "m1", "text": "hi",
        "fromSelf": true, "clientId": TEST_CLIENT_ID,
    });
    sync.apply_push_frame(&PushFrame::new("message:new", echo.to_string()))
        .await
        .unwrap();

    // Delivery receipt
    let status = json!({"wa_id": "929967673820", "msg_id": "m1", "status": "delivered"});
    sync.apply_push_frame(&PushFrame::new("message:status", status.to_string()))
        .await
        .unwrap();

    let conversation = sync.conversation(&dedew()).await.unwrap();
    let texts: Vec<_> = conversation.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["older", "hi"]);
    assert_eq!(conversation.messages[1].status, MessageStatus::Delivered);
    assert_eq!(conversation.messages[1].backend_id.as_deref(), Some("m1"));
    assert_eq!(conversation.last_message_preview, "hi");
}

#[tokio::test]
async fn test_history_failure_is_reported_and_state_kept() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/919937320320"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&backend.server)
        .await;

    let sync = backend.coordinator();
    let mut notices = sync.subscribe_notices();

    let err = sync.select_conversation(&ravi()).await.unwrap_err();
    assert!(err.is_transient());

    assert_eq!(
        notices.recv().await.unwrap(),
        SyncNotice::SelectionChanged(Some(ravi()))
    );
    assert_matches!(
        notices.recv().await.unwrap(),
        SyncNotice::NetworkError { operation: "history", .. }
    );
    assert_eq!(sync.selected().await, Some(ravi()));
    assert_eq!(sync.conversation(&ravi()).await.unwrap().display_name, "Ravi");
}

#[tokio::test]
async fn test_mark_last_own_read_with_fallback_route() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/929967673820"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message_doc("929967673820", "m1", "mine", true),
            message_doc("929967673820", "m2", "theirs", false),
        ])))
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/read"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages/m1/read"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;

    let sync = backend.coordinator();
    sync.select_conversation(&dedew()).await.unwrap();

    let marked = sync.mark_last_own(&dedew(), MessageStatus::Read).await.unwrap();
    assert_eq!(marked, "m1");
    let conversation = sync.conversation(&dedew()).await.unwrap();
    assert_eq!(conversation.messages[0].status, MessageStatus::Read);
}

#[tokio::test]
async fn test_start_new_conversation_writes_placeholder() {
    let backend = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/messages/14155550100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "wa_id": "14155550100",
            "text": "Chat started",
            "fromSelf": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg_id": "p1"})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let sync = backend.coordinator();
    let id = sync.start_new_conversation("Sam", "+1 (415) 555-0100").await.unwrap();

    let snapshot = sync.snapshot().await;
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].id, id);
    assert_eq!(snapshot[0].display_name, "Sam");
    assert_eq!(snapshot[0].last_seen_text, "Last seen just now");
    assert!(snapshot[0].messages.is_empty());
}

#[tokio::test]
async fn test_malformed_and_unknown_frames() {
    let backend = MockBackend::start().await;
    let sync = backend.coordinator();

    assert_matches!(
        sync.apply_push_frame(&PushFrame::new("message:status", r#"{"msg_id":"m1"}"#))
            .await,
        Err(SyncError::MalformedEvent { .. })
    );
    assert_matches!(
        sync.apply_push_frame(&PushFrame::new("presence", "{}")).await,
        Ok(None)
    );
    assert!(sync.conversation(&dedew()).await.unwrap().messages.is_empty());
}
