//! The observability sink contract.

use centralino_types::EventEnvelope;

/// Receives every structured event the router emits.
///
/// Implementations must be cheap and non-blocking; the router calls
/// `emit` inline on hot paths. Anything slow belongs behind a channel
/// owned by the embedder.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: &EventEnvelope);
}

/// Sink that drops every event; the default when the embedder installs
/// nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EventEnvelope) {}
}
