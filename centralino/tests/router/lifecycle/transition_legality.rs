use std::sync::Arc;

use centralino::{CentralinoError, KeyState, QueryFilter, RecordKind, StoreRecord};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn only_table_transitions_are_accepted() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");

    router
        .transition_credential(&k1, KeyState::Throttled, "operator pause")
        .await
        .unwrap();

    // Throttled -> Exhausted is not in the table.
    let err = router
        .transition_credential(&k1, KeyState::Exhausted, "nope")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CentralinoError::InvalidTransition {
            from: KeyState::Throttled,
            to: KeyState::Exhausted,
            ..
        }
    ));

    router
        .transition_credential(&k1, KeyState::Available, "operator resume")
        .await
        .unwrap();
    router
        .transition_credential(&k1, KeyState::Invalid, "manual invalidation")
        .await
        .unwrap();

    // Invalid -> Available is forbidden; any -> Disabled is not.
    assert!(
        router
            .transition_credential(&k1, KeyState::Available, "undo")
            .await
            .is_err()
    );
    router
        .transition_credential(&k1, KeyState::Disabled, "retire")
        .await
        .unwrap();
}

#[tokio::test]
async fn same_state_transition_is_a_silent_no_op() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");

    router
        .transition_credential(&k1, KeyState::Throttled, "pause")
        .await
        .unwrap();
    // Second request for the same state: accepted, but no record written.
    router
        .transition_credential(&k1, KeyState::Throttled, "pause again")
        .await
        .unwrap();

    let transitions = router
        .query(&QueryFilter::new(RecordKind::Transition))
        .await
        .unwrap();
    assert_eq!(transitions.len(), 1);
}

#[tokio::test]
async fn every_persisted_transition_satisfies_the_table() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");

    router
        .transition_credential(&k1, KeyState::Throttled, "pause")
        .await
        .unwrap();
    router
        .transition_credential(&k1, KeyState::Available, "resume")
        .await
        .unwrap();
    router
        .transition_credential(&k1, KeyState::Exhausted, "drained")
        .await
        .unwrap();
    router
        .transition_credential(&k1, KeyState::Available, "refilled")
        .await
        .unwrap();
    router
        .transition_credential(&k1, KeyState::Disabled, "retired")
        .await
        .unwrap();

    let records = router
        .query(&QueryFilter::new(RecordKind::Transition).credential(k1))
        .await
        .unwrap();
    assert_eq!(records.len(), 5);
    let mut previous_to: Option<KeyState> = None;
    for record in records {
        let StoreRecord::Transition(t) = record else {
            panic!("expected a transition record");
        };
        assert!(
            t.from.can_transition_to(t.to),
            "persisted illegal transition {:?} -> {:?}",
            t.from,
            t.to
        );
        if let Some(previous) = previous_to {
            assert_eq!(t.from, previous, "transition chain must be contiguous");
        }
        previous_to = Some(t.to);
    }
}
