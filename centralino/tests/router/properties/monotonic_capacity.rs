use std::sync::Arc;

use centralino::TimeWindow;
use centralino_mock::MockAdapter;
use chrono::Utc;
use proptest::prelude::*;

use crate::helpers;

async fn consumed_series(observations: &[u64]) -> Vec<u64> {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");

    let mut series = Vec::with_capacity(observations.len());
    for units in observations {
        router
            .observe_usage(&k1, TimeWindow::Daily, *units, Utc::now())
            .await
            .unwrap();
        let snapshot = router
            .capacity_snapshot(&k1, TimeWindow::Daily)
            .await
            .unwrap()
            .unwrap();
        series.push(snapshot.consumed);
    }
    series
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Between two observations without a reset, `consumed` never
    /// decreases and tracks the exact cumulative sum.
    #[test]
    fn consumed_is_monotonic_between_resets(observations in prop::collection::vec(0u64..500, 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let series = rt.block_on(consumed_series(&observations));

        let mut cumulative = 0u64;
        for (units, consumed) in observations.iter().zip(series.iter()) {
            cumulative += units;
            prop_assert_eq!(cumulative, *consumed);
        }
        for pair in series.windows(2) {
            prop_assert!(pair[1] >= pair[0]);
        }
    }
}

#[tokio::test]
async fn a_forced_reset_returns_consumed_to_zero() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;
    let k1 = helpers::cred("k1");

    router
        .observe_usage(&k1, TimeWindow::Hourly, 250, Utc::now())
        .await
        .unwrap();
    router.reset_capacity(&k1, TimeWindow::Hourly).await.unwrap();

    let snapshot = router
        .capacity_snapshot(&k1, TimeWindow::Hourly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.consumed, 0);
    assert!(sink.names().contains(&"quota_reset"));

    // Consumption resumes from zero afterwards.
    router
        .observe_usage(&k1, TimeWindow::Hourly, 10, Utc::now())
        .await
        .unwrap();
    let snapshot = router
        .capacity_snapshot(&k1, TimeWindow::Hourly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.consumed, 10);
}
