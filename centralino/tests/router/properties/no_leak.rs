use std::sync::Arc;

use centralino::{QueryFilter, RecordKind};
use centralino_mock::{MockAdapter, MockFailure, MockStep};
use proptest::prelude::*;

use crate::helpers;

/// Everything observable after a route (persisted records, emitted
/// events, returned values, and error messages) rendered to one string.
async fn observable_surface(material: &str) -> String {
    let adapter = Arc::new(MockAdapter::new("p1").with_steps([
        MockStep::Fail(MockFailure::Throttled(std::time::Duration::from_millis(50))),
        MockStep::Succeed,
    ]));
    let (router, sink) = helpers::router_with(&[adapter]);

    let credential = router
        .register_credential_named("k1", material.as_bytes(), "p1", helpers::meta(&[]))
        .await
        .unwrap();
    helpers::register(&router, "k2", "p1", &[]).await;

    let mut surface = String::new();
    surface.push_str(&format!("{credential:?}"));

    match router.route(&helpers::intent("p1")).await {
        Ok(receipt) => surface.push_str(&format!("{receipt:?}")),
        Err(err) => surface.push_str(&format!("{err:?} {err}")),
    }
    // A second route that fails terminally, to cover error surfaces too.
    let err = router.route(&helpers::intent("ghost")).await.unwrap_err();
    surface.push_str(&format!("{err:?} {err}"));

    for kind in [
        RecordKind::Credential,
        RecordKind::Decision,
        RecordKind::Transition,
        RecordKind::Snapshot,
    ] {
        for record in router.query(&QueryFilter::new(kind)).await.unwrap() {
            surface.push_str(&serde_json::to_string(&record).unwrap());
            surface.push_str(&format!("{record:?}"));
        }
    }
    for event in sink.events() {
        surface.push_str(&serde_json::to_string(&event).unwrap());
        surface.push_str(&format!("{event:?}"));
    }
    surface
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Raw credential material never appears in any observable surface,
    /// whatever the material looks like.
    #[test]
    fn material_never_leaks(material in "[A-Za-z0-9]{24,64}") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let surface = rt.block_on(observable_surface(&material));
        prop_assert!(
            !surface.contains(&material),
            "credential material leaked into an observable surface"
        );
    }
}
