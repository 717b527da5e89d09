use std::sync::Arc;

use centralino::{CapacityTier, CentralinoError, KeyState, TimeWindow};
use centralino_mock::MockAdapter;
use chrono::Utc;

use crate::helpers;

#[tokio::test]
async fn exhausting_the_daily_window_gates_the_credential_off() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    let k1 = helpers::cred("k1");
    router
        .configure_capacity(&k1, TimeWindow::Daily, Some(1000))
        .await
        .unwrap();

    let outcome = router
        .observe_usage(&k1, TimeWindow::Daily, 1001, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome.tier, CapacityTier::Exhausted);
    assert!(outcome.became_exhausted);

    let snapshot = router
        .capacity_snapshot(&k1, TimeWindow::Daily)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.tier, CapacityTier::Exhausted);
    assert_eq!(snapshot.remaining(), Some(0));

    // The credential transitioned with it.
    assert_eq!(router.credential(&k1).unwrap().state, KeyState::Exhausted);
    assert!(sink.names().contains(&"quota_exhausted"));
    assert!(sink.names().contains(&"credential_transitioned"));

    // With only k1 in the pool, routing has nothing left.
    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    let CentralinoError::NoEligibleCandidates { breakdown } = err else {
        panic!("expected NoEligibleCandidates, got {err:?}");
    };
    assert_eq!(breakdown.exhausted, 1);
    assert_eq!(breakdown.total(), 1);
}

#[tokio::test]
async fn tier_thresholds_step_down_as_capacity_drains() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");
    router
        .configure_capacity(&k1, TimeWindow::Hourly, Some(100))
        .await
        .unwrap();

    let tier = router
        .observe_usage(&k1, TimeWindow::Hourly, 40, Utc::now())
        .await
        .unwrap()
        .tier;
    assert_eq!(tier, CapacityTier::Abundant);

    let tier = router
        .observe_usage(&k1, TimeWindow::Hourly, 20, Utc::now())
        .await
        .unwrap()
        .tier;
    assert_eq!(tier, CapacityTier::Constrained);

    let tier = router
        .observe_usage(&k1, TimeWindow::Hourly, 30, Utc::now())
        .await
        .unwrap()
        .tier;
    assert_eq!(tier, CapacityTier::Critical);
}
