use std::sync::Arc;

use centralino_mock::MockAdapter;

use crate::helpers;

/// `route` is called concurrently from many tasks over shared state; every
/// call must complete and the bookkeeping must add up.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_routes_share_the_pool_safely() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter.clone()]);
    for id in ["k1", "k2", "k3", "k4"] {
        helpers::register(&router, id, "p1", &[]).await;
    }
    let router = Arc::new(router);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let router = Arc::clone(&router);
        handles.push(tokio::spawn(async move {
            router.route(&helpers::intent("p1")).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        handle.await.unwrap().unwrap();
        ok += 1;
    }
    assert_eq!(ok, 20);
    assert_eq!(adapter.calls().len(), 20);

    let total_successes: u64 = router.credentials().iter().map(|c| c.successes).sum();
    assert_eq!(total_successes, 20);
}
