//! Property-based tests for message status handling

use proptest::prelude::*;

use chatsync::client::reconciliation::ReconcileOutcome;
use chatsync::shared::messaging::MessageStatus;

use crate::common::{dedew, incoming, test_engine};

fn status() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sent),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
    ]
}

proptest! {
    #[test]
    fn test_status_parse_ignores_case_and_padding(status in status(), upper in any::<bool>()) {
        let raw = if upper {
            format!("  {}  ", status.as_str().to_uppercase())
        } else {
            status.as_str().to_string()
        };
        prop_assert_eq!(MessageStatus::parse(&raw), Some(status));
    }

    #[test]
    fn test_forward_only_status_never_regresses(updates in proptest::collection::vec(status(), 1..12)) {
        let mut engine = test_engine().forward_only_status(true);
        engine.push_new_message(incoming(dedew(), "m1", "hey"));

        let mut highest = MessageStatus::Sent;
        for status in updates {
            let outcome = engine.push_status_update(&dedew(), "m1", status);
            prop_assert!(outcome != ReconcileOutcome::Dropped(chatsync::client::reconciliation::DropReason::UnknownTarget));
            highest = highest.max(status);
            let current = engine.store().conversation(&dedew()).unwrap().messages[0].status;
            prop_assert_eq!(current, highest);
        }
    }

    #[test]
    fn test_unguarded_status_follows_last_update(updates in proptest::collection::vec(status(), 1..12)) {
        let mut engine = test_engine();
        engine.push_new_message(incoming(dedew(), "m1", "hey"));

        for status in &updates {
            engine.push_status_update(&dedew(), "m1", *status);
        }
        let current = engine.store().conversation(&dedew()).unwrap().messages[0].status;
        prop_assert_eq!(Some(current), updates.last().copied());
    }
}
