use std::collections::HashMap;
use std::sync::Arc;

use centralino::Objective;
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn fairness_spreads_load_evenly_across_healthy_credentials() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    for id in ["k1", "k2", "k3", "k4"] {
        helpers::register(&router, id, "p1", &[]).await;
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..100 {
        let receipt = router
            .route(&helpers::intent("p1").objective(Objective::fairness()))
            .await
            .unwrap();
        *counts.entry(receipt.credential_id.to_string()).or_default() += 1;
    }

    assert_eq!(counts.values().sum::<usize>(), 100);
    for id in ["k1", "k2", "k3", "k4"] {
        let count = counts.get(id).copied().unwrap_or(0);
        assert!(
            (20..=30).contains(&count),
            "{id} selected {count} times; distribution {counts:?}"
        );
    }
}
