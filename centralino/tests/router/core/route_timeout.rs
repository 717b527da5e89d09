use std::sync::Arc;
use std::time::Duration;

use centralino::{CentralinoError, RouterConfig};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn slow_upstream_times_out_without_penalizing_the_credential() {
    let adapter = Arc::new(MockAdapter::new("p1").with_latency(Duration::from_millis(200)));
    let cfg = RouterConfig {
        provider_timeout: Duration::from_millis(30),
        ..RouterConfig::default()
    };
    let (router, _sink) = helpers::router_with_cfg(&[adapter], cfg);
    helpers::register(&router, "k1", "p1", &[]).await;

    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    assert!(
        matches!(err, CentralinoError::Timeout { .. }),
        "expected Timeout, got {err:?}"
    );

    // With no outcome observable upstream, the counters stay untouched.
    let k1 = router.credential(&helpers::cred("k1")).unwrap();
    assert_eq!(k1.successes, 0);
    assert_eq!(k1.failures, 0);
}

#[tokio::test]
async fn overall_request_deadline_bounds_the_whole_route() {
    let adapter = Arc::new(MockAdapter::new("p1").with_latency(Duration::from_millis(100)));
    let cfg = RouterConfig {
        provider_timeout: Duration::from_millis(60),
        request_timeout: Some(Duration::from_millis(80)),
        ..RouterConfig::default()
    };
    let (router, _sink) = helpers::router_with_cfg(&[adapter], cfg);
    helpers::register(&router, "k1", "p1", &[]).await;

    let started = std::time::Instant::now();
    let err = router.route(&helpers::intent("p1")).await.unwrap_err();
    assert!(matches!(err, CentralinoError::Timeout { .. }));
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "route should give up near the overall deadline"
    );
}
