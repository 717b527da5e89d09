use std::sync::Arc;

use centralino::{CentralinoError, Policy, PolicyScope, SelectionRule};
use centralino_mock::MockAdapter;

use crate::helpers;

fn eu_only() -> Policy {
    Policy::selection(
        "eu-only",
        PolicyScope::Global,
        vec![SelectionRule::MetadataEquals {
            key: "region".into(),
            value: "eu".into(),
        }],
    )
}

#[tokio::test]
async fn selection_policy_excludes_non_matching_credentials() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    router.set_policies(vec![eu_only()]).unwrap();
    helpers::register(&router, "k1", "p1", &[("region", "us")]).await;
    helpers::register(&router, "k2", "p1", &[("region", "eu")]).await;

    for _ in 0..3 {
        let receipt = router.route(&helpers::intent("p1")).await.unwrap();
        assert_eq!(receipt.credential_id.as_str(), "k2");
    }
}

#[tokio::test]
async fn a_fully_filtered_pool_reports_policy_blocked() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    router.set_policies(vec![eu_only()]).unwrap();
    helpers::register(&router, "k1", "p1", &[("region", "us")]).await;

    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    let CentralinoError::NoEligibleCandidates { breakdown } = err else {
        panic!("expected NoEligibleCandidates, got {err:?}");
    };
    assert_eq!(breakdown.policy_blocked, 1);
}

#[test]
fn policies_referencing_unknown_providers_are_rejected() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);

    let err = router
        .set_policies(vec![Policy::selection(
            "ghost",
            PolicyScope::Provider("ghost-provider".into()),
            vec![],
        )])
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("unknown provider") && message.contains("ghost-provider"),
        "error should name the unknown provider, got: {message}"
    );
}
