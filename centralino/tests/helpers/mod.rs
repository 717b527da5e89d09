#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use centralino::{
    Centralino, ChatMessage, Credential, CredentialId, RequestIntent, RouterConfig,
};
use centralino_mock::{MockAdapter, RecordingSink};

/// Build a router over the given mock adapters with a recording sink and
/// the default configuration.
pub fn router_with(adapters: &[Arc<MockAdapter>]) -> (Centralino, Arc<RecordingSink>) {
    router_with_cfg(adapters, RouterConfig::default())
}

/// Build a router over the given mock adapters with a recording sink and
/// a custom configuration.
pub fn router_with_cfg(
    adapters: &[Arc<MockAdapter>],
    cfg: RouterConfig,
) -> (Centralino, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let mut builder = Centralino::builder()
        .config(cfg)
        .event_sink(sink.clone());
    for adapter in adapters {
        builder = builder.with_adapter(adapter.clone());
    }
    (builder.build().expect("router builds"), sink)
}

/// A one-message intent for `provider` and model "m".
pub fn intent(provider: &str) -> RequestIntent {
    RequestIntent::new(provider, "m").message(ChatMessage::user("hi"))
}

/// Metadata map from string pairs.
pub fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Register a named credential with metadata, panicking on failure.
pub async fn register(
    router: &Centralino,
    id: &str,
    provider: &str,
    metadata: &[(&str, &str)],
) -> Credential {
    router
        .register_credential_named(
            id,
            format!("sk-material-{id}").as_bytes(),
            provider,
            meta(metadata),
        )
        .await
        .expect("credential registers")
}

/// Shorthand for a typed credential id.
pub fn cred(id: &str) -> CredentialId {
    CredentialId::new(id)
}
