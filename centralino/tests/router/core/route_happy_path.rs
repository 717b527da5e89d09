use std::sync::Arc;

use centralino::{QueryFilter, RecordKind, StoreRecord, TimeWindow};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn single_credential_happy_path() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, sink) = helpers::router_with(&[adapter.clone()]);
    helpers::register(&router, "k1", "p1", &[("tier", "basic")]).await;

    let receipt = router.route(&helpers::intent("p1")).await.unwrap();
    assert_eq!(receipt.credential_id.as_str(), "k1");
    assert_eq!(receipt.attempts, 1);
    assert_eq!(receipt.usage.total(), 30);
    assert_eq!(adapter.calls().len(), 1);

    // One decision, explained, selecting the only candidate.
    let decisions = router
        .query(&QueryFilter::new(RecordKind::Decision))
        .await
        .unwrap();
    assert_eq!(decisions.len(), 1);
    let StoreRecord::Decision(decision) = &decisions[0] else {
        panic!("expected a decision record");
    };
    assert_eq!(decision.chosen.as_str(), "k1");
    assert_eq!(decision.explanation, "only candidate");
    assert_eq!(decision.id, receipt.decision_id);

    // Still Available: no transitions recorded.
    let transitions = router
        .query(&QueryFilter::new(RecordKind::Transition))
        .await
        .unwrap();
    assert!(transitions.is_empty());

    // One capacity observation against the default daily window.
    let snapshot = router
        .capacity_snapshot(&helpers::cred("k1"), TimeWindow::Daily)
        .await
        .unwrap()
        .expect("snapshot recorded");
    assert_eq!(snapshot.consumed, 30);

    let names = sink.names();
    assert!(names.contains(&"credential_registered"));
    assert!(names.contains(&"request_started"));
    assert!(names.contains(&"decision_recorded"));
    assert!(names.contains(&"request_succeeded"));
}

#[tokio::test]
async fn correlation_id_propagates_into_request_events() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    let intent = helpers::intent("p1");
    let correlation = intent.correlation_id.clone();
    router.route(&intent).await.unwrap();

    let correlated: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| e.correlation_id.as_deref() == Some(correlation.as_str()))
        .map(|e| e.event.name())
        .collect();
    assert!(correlated.contains(&"request_started"));
    assert!(correlated.contains(&"decision_recorded"));
    assert!(correlated.contains(&"request_succeeded"));
}
