//! The provider adapter contract.
//!
//! One adapter exists per upstream provider. Adapters are stateless with
//! respect to credential bookkeeping: they execute requests, price them,
//! and classify their own failures, and never touch router state.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::CentralinoError;
use crate::vault::OpenedMaterial;
use centralino_types::{CostEstimate, ProviderKey, RequestIntent, TokenUsage};

/// How the router should react to an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Retry on the same credential after backoff.
    Transient,
    /// Cool the credential down and retry on a different one.
    Throttled {
        /// Minimum wait before the credential may be considered again.
        cooldown: Duration,
    },
    /// Mark the credential invalid and retry on a different one.
    Auth,
    /// Mark the credential exhausted and retry on a different one.
    QuotaExceeded,
    /// Surface to the caller; no retry.
    Permanent,
}

/// Raw upstream response before router bookkeeping.
#[derive(Debug, Clone)]
pub struct AdapterResponse {
    /// Response content.
    pub content: String,
    /// Model that served the request.
    pub model: String,
    /// Token usage reported by the upstream.
    pub usage: TokenUsage,
    /// Actual cost if the upstream reports one; the router falls back to
    /// the estimate otherwise.
    pub cost: Option<Decimal>,
}

/// Contract every provider adapter implements.
///
/// Registration validates the full capability set by construction: an
/// adapter that compiles satisfies it.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short static name of the provider ("openai", "anthropic", ...).
    fn name(&self) -> &'static str;

    /// Typed registry key; defaults to the adapter name.
    fn key(&self) -> ProviderKey {
        ProviderKey::new(self.name())
    }

    /// Dispatch one request using the opened credential material.
    ///
    /// `deadline` is the remaining time the router grants this attempt;
    /// adapters should propagate it to their transport.
    async fn execute(
        &self,
        intent: &RequestIntent,
        material: &OpenedMaterial,
        deadline: Duration,
    ) -> Result<AdapterResponse, CentralinoError>;

    /// Estimate the cost of dispatching `intent`, from the adapter's own
    /// price table.
    fn estimate_cost(&self, intent: &RequestIntent) -> Result<CostEstimate, CentralinoError>;

    /// Classify a failure returned by [`execute`](Self::execute).
    fn classify_error(&self, error: &CentralinoError) -> ErrorDisposition;

    /// Version tag of the adapter's price table, recorded for audit.
    fn price_table_version(&self) -> &'static str;
}
