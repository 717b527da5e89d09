use std::sync::Arc;

use centralino::{CentralinoError, KeyState, QueryFilter, RecordKind};
use centralino_mock::{MockAdapter, MockFailure, MockStep};

use crate::helpers;

#[tokio::test]
async fn register_then_get_returns_an_equal_record() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    let registered = helpers::register(&router, "k1", "p1", &[("tier", "pro")]).await;

    let fetched = router.credential(&helpers::cred("k1")).unwrap();
    assert_eq!(fetched.id, registered.id);
    assert_eq!(fetched.provider, registered.provider);
    assert_eq!(fetched.material, registered.material);
    assert_eq!(fetched.state, KeyState::Available);
    assert_eq!(fetched.metadata.get("tier").map(String::as_str), Some("pro"));

    assert!(matches!(
        router.credential(&helpers::cred("missing")).unwrap_err(),
        CentralinoError::NotFound { .. }
    ));
}

#[tokio::test]
async fn rotation_swaps_material_and_clears_failures() {
    // One transient failure puts a failure on k1's counters first.
    let adapter = Arc::new(
        MockAdapter::new("p1").with_steps([MockStep::Fail(MockFailure::Transient)]),
    );
    let (router, sink) = helpers::router_with(&[adapter.clone()]);
    helpers::register(&router, "k1", "p1", &[]).await;

    router.route(&helpers::intent("p1")).await.unwrap();
    let before = router.credential(&helpers::cred("k1")).unwrap();
    assert_eq!(before.failures, 1);
    assert_eq!(before.successes, 1);

    let rotated = router
        .rotate_credential(&helpers::cred("k1"), b"sk-rotated-material")
        .await
        .unwrap();
    assert_eq!(rotated.failures, 0, "rotation resets the failure counter");
    assert_eq!(rotated.successes, before.successes, "successes survive");
    assert_ne!(rotated.material, before.material);
    assert!(sink.names().contains(&"credential_rotated"));

    // The rotated material is what dispatch opens from now on.
    router.route(&helpers::intent("p1")).await.unwrap();
    let calls = adapter.calls();
    assert_eq!(
        calls.last().unwrap().material_len,
        b"sk-rotated-material".len()
    );
}

#[tokio::test]
async fn revocation_disables_forever_but_keeps_the_record() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    router
        .revoke_credential(&helpers::cred("k1"), "leaked in CI logs")
        .await
        .unwrap();

    let k1 = router.credential(&helpers::cred("k1")).unwrap();
    assert_eq!(k1.state, KeyState::Disabled);
    assert!(sink.names().contains(&"credential_revoked"));

    // Revoked is terminal.
    let err = router
        .transition_credential(&helpers::cred("k1"), KeyState::Available, "undo")
        .await
        .unwrap_err();
    assert!(matches!(err, CentralinoError::InvalidTransition { .. }));

    // The record survives for audit and still shows in queries.
    let records = router
        .query(&QueryFilter::new(RecordKind::Credential).state(KeyState::Disabled))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    // Routing sees an empty pool, not a missing credential.
    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    let CentralinoError::NoEligibleCandidates { breakdown } = err else {
        panic!("expected NoEligibleCandidates, got {err:?}");
    };
    assert_eq!(breakdown.disabled, 1);
}

#[tokio::test]
async fn auth_failures_invalidate_the_credential() {
    let adapter = Arc::new(
        MockAdapter::new("p1").with_steps([MockStep::Fail(MockFailure::Auth)]),
    );
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    helpers::register(&router, "k2", "p1", &[]).await;

    // k1 fails auth; the route fails over to k2 and succeeds.
    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k2");
    assert_eq!(
        router.credential(&helpers::cred("k1")).unwrap().state,
        KeyState::Invalid
    );
}
