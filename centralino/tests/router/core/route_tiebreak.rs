use std::sync::Arc;

use centralino::{QueryFilter, RecordKind, StoreRecord};
use centralino_mock::MockAdapter;

use crate::helpers;

/// Fresh identical credentials score identically; the deterministic break
/// (success rate, usage, id) must always land on the same one.
#[tokio::test]
async fn identical_candidates_resolve_to_the_lowest_id() {
    for _ in 0..5 {
        let adapter = Arc::new(MockAdapter::new("p1"));
        let (router, _sink) = helpers::router_with(&[adapter]);
        // Registration order deliberately scrambled.
        for id in ["k3", "k1", "k2"] {
            helpers::register(&router, id, "p1", &[]).await;
        }

        let receipt = router.route(&helpers::intent("p1")).await.unwrap();
        assert_eq!(receipt.credential_id.as_str(), "k1");

        let decisions = router
            .query(&QueryFilter::new(RecordKind::Decision))
            .await
            .unwrap();
        let StoreRecord::Decision(decision) = &decisions[0] else {
            panic!("expected a decision record");
        };
        // The three-way tie is recorded on the decision.
        assert_eq!(decision.tied.len(), 3);
        assert!(decision.explanation.contains("tie"));
    }
}
