use std::sync::Arc;
use std::time::Duration;

use centralino::{KeyState, Objective, QueryFilter, RecordKind, StoreRecord, TransitionReason};
use centralino_mock::{MockAdapter, MockFailure, MockStep};

use crate::helpers;

#[tokio::test]
async fn throttle_fails_over_and_the_cooldown_gates_reentry() {
    // First dispatch (lands on k1 via the id tie-break) throttles with a
    // 150ms cooldown; everything after succeeds.
    let adapter = Arc::new(
        MockAdapter::new("p1")
            .with_steps([MockStep::Fail(MockFailure::Throttled(Duration::from_millis(150)))]),
    );
    let (router, _sink) = helpers::router_with(&[adapter.clone()]);
    helpers::register(&router, "k1", "p1", &[]).await;
    helpers::register(&router, "k2", "p1", &[]).await;

    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k2");
    assert_eq!(receipt.attempts, 2);

    // k1 is now cooling down and excluded from eligibility.
    let k1 = router.credential(&helpers::cred("k1")).unwrap();
    assert_eq!(k1.state, KeyState::Throttled);
    assert!(k1.cooldown_until.is_some());

    let eligible = router.eligible_credentials("p1").await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id.as_str(), "k2");

    // Past the cooldown, the next eligibility query auto-promotes k1 and
    // records the transition.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let eligible = router.eligible_credentials("p1").await.unwrap();
    assert_eq!(eligible.len(), 2);
    assert_eq!(
        router.credential(&helpers::cred("k1")).unwrap().state,
        KeyState::Available
    );

    let transitions = router
        .query(&QueryFilter::new(RecordKind::Transition).credential(helpers::cred("k1")))
        .await
        .unwrap();
    let reasons: Vec<TransitionReason> = transitions
        .iter()
        .map(|record| {
            let StoreRecord::Transition(t) = record else {
                panic!("expected a transition record");
            };
            t.reason
        })
        .collect();
    assert_eq!(
        reasons,
        vec![TransitionReason::RateLimit, TransitionReason::CooldownElapsed]
    );

    // The recovered credential is routable again: fairness prefers the
    // idle k1.
    let receipt = router
        .route(&helpers::intent("p1").objective(Objective::fairness()))
        .await
        .unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k1");
}
