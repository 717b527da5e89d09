use std::sync::Arc;

use centralino::{QueryFilter, RecordKind, StoreRecord};
use centralino_mock::MockAdapter;

use crate::helpers;

/// A durable decision record precedes action: the persisted decision's
/// timestamp never postdates the adapter call it authorized.
#[tokio::test]
async fn the_decision_record_precedes_the_adapter_call() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter.clone()]);
    helpers::register(&router, "k1", "p1", &[]).await;

    for _ in 0..5 {
        router.route(&helpers::intent("p1")).await.unwrap();
    }

    let decisions = router
        .query(&QueryFilter::new(RecordKind::Decision))
        .await
        .unwrap();
    let calls = adapter.calls();
    assert_eq!(decisions.len(), calls.len());

    for (record, call) in decisions.iter().zip(calls.iter()) {
        let StoreRecord::Decision(decision) = record else {
            panic!("expected a decision record");
        };
        assert!(
            decision.at <= call.at,
            "decision at {} but adapter called at {}",
            decision.at,
            call.at
        );
    }
}
