//! Property-based tests for the reconciliation engine

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use chatsync::client::identity::ClientInstanceId;
use chatsync::client::reconciliation::{HistoryRecord, ReconciliationEngine, SyncEvent};
use chatsync::shared::messaging::{ConversationId, MessageStatus};

use crate::common::{dedew, incoming, ravi, test_engine, TEST_CLIENT_ID};

fn conversation_id() -> impl Strategy<Value = ConversationId> {
    prop_oneof![Just(dedew()), Just(ravi())]
}

fn backend_id() -> impl Strategy<Value = String> {
    // Small pool so collisions and redeliveries are frequent
    prop_oneof![
        Just("m1".to_string()),
        Just("m2".to_string()),
        Just("m3".to_string()),
        Just("m4".to_string()),
    ]
}

fn status() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sent),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
    ]
}

fn history_record() -> impl Strategy<Value = HistoryRecord> {
    (
        proptest::option::of(backend_id()),
        "[a-z ]{0,12}",
        any::<bool>(),
        proptest::option::of(status()),
    )
        .prop_map(|(backend_id, text, from_self, status)| HistoryRecord {
            backend_id,
            text,
            timestamp: None,
            from_self,
            status,
        })
}

fn event() -> impl Strategy<Value = SyncEvent> {
    prop_oneof![
        (conversation_id(), "[a-z]{1,8}").prop_map(|(conversation_id, text)| {
            SyncEvent::OptimisticSend {
                conversation_id,
                text,
                now: Utc.timestamp_opt(1_709_283_900, 0).unwrap(),
            }
        }),
        (conversation_id(), backend_id()).prop_map(|(conversation_id, backend_id)| {
            SyncEvent::SendAcknowledged {
                conversation_id,
                backend_id,
            }
        }),
        (
            conversation_id(),
            backend_id(),
            "[a-z]{0,8}",
            any::<bool>(),
            proptest::option::of(status()),
            any::<bool>(),
        )
            .prop_map(|(conversation_id, backend_id, text, from_self, status, echo)| {
                let mut message = incoming(conversation_id, &backend_id, &text);
                message.from_self = from_self;
                message.status = status;
                if echo {
                    message.origin = Some(ClientInstanceId::from(TEST_CLIENT_ID));
                }
                SyncEvent::PushNewMessage(message)
            }),
        (conversation_id(), backend_id(), status()).prop_map(
            |(conversation_id, backend_id, status)| SyncEvent::PushStatusUpdate {
                conversation_id,
                backend_id,
                status,
            }
        ),
        (conversation_id(), proptest::collection::vec(history_record(), 0..6)).prop_map(
            |(conversation_id, records)| SyncEvent::HistoryFetched {
                conversation_id,
                records,
            }
        ),
    ]
}

fn assert_unique_backend_ids(engine: &ReconciliationEngine) -> Result<(), TestCaseError> {
    for conversation in engine.store().conversations() {
        let mut seen = HashSet::new();
        for id in conversation.messages.iter().filter_map(|m| m.backend_id.as_deref()) {
            prop_assert!(seen.insert(id), "duplicate backend id {} in {}", id, conversation.id);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_no_duplicate_backend_ids(events in proptest::collection::vec(event(), 0..40)) {
        let mut engine = test_engine();
        for event in events {
            engine.apply(event);
            assert_unique_backend_ids(&engine)?;
        }
    }

    #[test]
    fn test_push_new_message_is_idempotent(
        events in proptest::collection::vec(event(), 0..20),
        backend_id in backend_id(),
        text in "[a-z]{1,8}",
        status in proptest::option::of(status()),
    ) {
        let mut engine = test_engine();
        for event in events {
            engine.apply(event);
        }
        let mut message = incoming(dedew(), &backend_id, &text);
        message.status = status;

        engine.push_new_message(message.clone());
        let once = engine.store().snapshot();
        engine.push_new_message(message);

        prop_assert_eq!(engine.store().snapshot(), once);
    }

    #[test]
    fn test_echo_never_changes_store(
        events in proptest::collection::vec(event(), 0..20),
        backend_id in backend_id(),
        text in "[a-z]{1,8}",
    ) {
        let mut engine = test_engine();
        for event in events {
            engine.apply(event);
        }
        let before = engine.store().snapshot();

        let mut echo = incoming(dedew(), &backend_id, &text);
        echo.from_self = true;
        echo.origin = Some(ClientInstanceId::from(TEST_CLIENT_ID));
        engine.push_new_message(echo);

        prop_assert_eq!(engine.store().snapshot(), before);
    }

    #[test]
    fn test_history_replaces_regardless_of_prior_state(
        events in proptest::collection::vec(event(), 0..20),
        records in proptest::collection::vec(history_record(), 0..8),
    ) {
        let mut engine = test_engine();
        for event in events {
            engine.apply(event);
        }
        engine.history_fetched(&ravi(), records.clone());

        // Repeated backend ids keep their first occurrence
        let mut seen = HashSet::new();
        let expected: Vec<_> = records
            .iter()
            .filter(|r| r.backend_id.as_ref().map_or(true, |id| seen.insert(id.clone())))
            .map(|r| (r.backend_id.clone(), r.text.clone(), r.from_self, r.status.unwrap_or_default()))
            .collect();
        let actual: Vec<_> = engine
            .store()
            .conversation(&ravi())
            .unwrap()
            .messages
            .iter()
            .map(|m| (m.backend_id.clone(), m.text.clone(), m.from_self, m.status))
            .collect();

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn test_acknowledgments_resolve_in_reverse_recency(texts in proptest::collection::vec("[a-z]{1,6}", 1..6)) {
        let mut engine = test_engine();
        let now = Utc.timestamp_opt(1_709_283_900, 0).unwrap();
        for text in &texts {
            engine.optimistic_send(&dedew(), text, now);
        }
        for n in 0..texts.len() {
            engine.send_acknowledged(&dedew(), &format!("ack-{}", n));
        }

        let messages = &engine.store().conversation(&dedew()).unwrap().messages;
        for (n, message) in messages.iter().rev().enumerate() {
            let expected = format!("ack-{}", n);
            prop_assert_eq!(message.backend_id.as_deref(), Some(expected.as_str()));
        }
    }
}
