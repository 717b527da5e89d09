use std::sync::Arc;

use centralino::{
    CentralinoError, CostRule, Objective, Policy, PolicyScope, QueryFilter, RecordKind,
    StoreRecord,
};
use centralino_mock::MockAdapter;
use rust_decimal::Decimal;

use crate::helpers;

#[tokio::test]
async fn max_cost_per_request_excludes_expensive_credentials() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    router
        .set_policies(vec![Policy::cost(
            "request-cap",
            PolicyScope::Global,
            vec![CostRule::MaxCostPerRequest {
                limit: Decimal::new(1, 3), // 0.001
            }],
        )])
        .unwrap();
    // k1's metadata hint prices it far above the cap; k2 well below.
    helpers::register(&router, "k1", "p1", &[("cost_per_1k", "0.50")]).await;
    helpers::register(&router, "k2", "p1", &[("cost_per_1k", "0.001")]).await;

    let receipt = router
        .route(&helpers::intent("p1").objective(Objective::reliability()))
        .await
        .unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k2");

    // Only k2 survived the gates; the decision shows it.
    let decisions = router
        .query(&QueryFilter::new(RecordKind::Decision))
        .await
        .unwrap();
    let StoreRecord::Decision(decision) = &decisions[0] else {
        panic!("expected a decision record");
    };
    assert_eq!(decision.candidates.len(), 1);
    assert_eq!(decision.candidates[0].as_str(), "k2");
}

#[tokio::test]
async fn a_cap_below_every_estimate_empties_the_pool() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    router
        .set_policies(vec![Policy::cost(
            "impossible-cap",
            PolicyScope::Global,
            vec![CostRule::MaxCostPerRequest {
                limit: Decimal::ZERO,
            }],
        )])
        .unwrap();
    helpers::register(&router, "k1", "p1", &[("cost_per_1k", "0.01")]).await;

    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    let CentralinoError::NoEligibleCandidates { breakdown } = err else {
        panic!("expected NoEligibleCandidates, got {err:?}");
    };
    assert_eq!(breakdown.policy_blocked, 1);
}
