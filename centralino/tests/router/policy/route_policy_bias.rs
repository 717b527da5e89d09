use std::sync::Arc;

use centralino::{Policy, PolicyScope, RoutingRule};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn routing_bias_overrides_the_id_tie_break() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    router
        .set_policies(vec![Policy::routing(
            "prefer-premium",
            PolicyScope::Global,
            vec![RoutingRule::PreferMetadata {
                key: "tier".into(),
                value: "premium".into(),
                weight: 0.5,
            }],
        )])
        .unwrap();
    // Without the bias, the id tie-break would select k1.
    helpers::register(&router, "k1", "p1", &[("tier", "basic")]).await;
    helpers::register(&router, "k2", "p1", &[("tier", "premium")]).await;

    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k2");
}

#[tokio::test]
async fn min_success_rate_penalizes_flaky_credentials() {
    use centralino_mock::{MockFailure, MockStep};

    // k1 takes three transient failures (one per route, same credential
    // retried), building a poor success rate; k2 stays clean.
    let adapter = Arc::new(MockAdapter::new("p1").with_steps([
        MockStep::Fail(MockFailure::Transient),
        MockStep::Fail(MockFailure::Transient),
        MockStep::Fail(MockFailure::Transient),
    ]));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    // The first route eats the scripted failures on k1, then succeeds.
    router.route(&helpers::intent("p1")).await.unwrap_err();
    let k1 = router.credential(&helpers::cred("k1")).unwrap();
    assert!(k1.failures >= 3);

    helpers::register(&router, "k2", "p1", &[]).await;
    router
        .set_policies(vec![Policy::routing(
            "floor",
            PolicyScope::Global,
            vec![RoutingRule::MinSuccessRate { rate: 0.9 }],
        )])
        .unwrap();

    // Both miss the 0.9 floor and take the same penalty; the tie then
    // breaks on usage count, away from the credential with the failure
    // history.
    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k2");
}
