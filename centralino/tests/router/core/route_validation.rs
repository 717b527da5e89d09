use std::sync::Arc;

use centralino::{Centralino, CentralinoError, ChatMessage, RequestIntent};
use centralino_mock::MockAdapter;

use crate::helpers;

#[tokio::test]
async fn unknown_provider_is_rejected_before_selection() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    let err = router.route(&helpers::intent("nope")).await.unwrap_err();
    assert!(matches!(err, CentralinoError::UnknownProvider { .. }));
}

#[tokio::test]
async fn empty_model_and_empty_messages_are_rejected() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);
    helpers::register(&router, "k1", "p1", &[]).await;

    let no_model = RequestIntent::new("p1", "  ").message(ChatMessage::user("hi"));
    assert!(matches!(
        router.route(&no_model).await.unwrap_err(),
        CentralinoError::Validation(_)
    ));

    let no_messages = RequestIntent::new("p1", "m");
    assert!(matches!(
        router.route(&no_messages).await.unwrap_err(),
        CentralinoError::Validation(_)
    ));
}

#[test]
fn builder_rejects_empty_and_duplicate_registries() {
    let err = Centralino::builder().build().unwrap_err();
    assert!(matches!(err, CentralinoError::Validation(_)));

    let err = Centralino::builder()
        .with_adapter(Arc::new(MockAdapter::new("p1")))
        .with_adapter(Arc::new(MockAdapter::new("p1")))
        .build()
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("duplicate") && message.contains("p1"),
        "error should name the duplicated provider, got: {message}"
    );
}

#[tokio::test]
async fn registration_requires_a_known_provider_and_material() {
    let adapter = Arc::new(MockAdapter::new("p1"));
    let (router, _sink) = helpers::router_with(&[adapter]);

    let err = router
        .register_credential(b"sk-x", "ghost", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CentralinoError::Registration(_)));

    let err = router
        .register_credential(b"", "p1", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CentralinoError::Registration(_)));
}
