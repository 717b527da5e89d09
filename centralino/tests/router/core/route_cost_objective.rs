use std::sync::Arc;

use centralino::{Objective, QueryFilter, RecordKind, StoreRecord};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn cost_objective_prefers_the_cheaper_credential() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[("cost_per_1k", "0.03")]).await;
    helpers::register(&router, "k2", "p1", &[("cost_per_1k", "0.01")]).await;

    let mut k2_selected = 0;
    for _ in 0..10 {
        let receipt = router
            .route(&helpers::intent("p1").objective(Objective::cost()))
            .await
            .unwrap();
        if receipt.credential_id.as_str() == "k2" {
            k2_selected += 1;
        }
    }
    assert!(
        k2_selected >= 9,
        "cheaper credential selected only {k2_selected}/10 times"
    );

    let decisions = router
        .query(&QueryFilter::new(RecordKind::Decision))
        .await
        .unwrap();
    assert_eq!(decisions.len(), 10);
    for record in decisions {
        let StoreRecord::Decision(decision) = record else {
            panic!("expected a decision record");
        };
        assert!(
            decision.explanation.contains("cost"),
            "explanation should mention cost: {}",
            decision.explanation
        );
        assert_eq!(decision.candidates.len(), 2);
    }
}
