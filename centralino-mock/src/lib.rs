//! Mock collaborators for centralino tests and examples.
//!
//! [`MockAdapter`] is a deterministic, scriptable provider adapter: by
//! default every dispatch succeeds with fixed usage; tests can queue
//! failure steps or override execution and estimation with closures.
//! [`RecordingSink`] captures the emitted event stream for assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use centralino_core::adapter::{AdapterResponse, ErrorDisposition, ProviderAdapter};
use centralino_core::events::EventSink;
use centralino_core::vault::OpenedMaterial;
use centralino_core::CentralinoError;
use centralino_types::{
    CostEstimate, EstimateSource, EventEnvelope, RequestIntent, TokenUsage,
};

/// Failure kinds the mock can be scripted to produce, matching the
/// dispositions the router reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Retryable on the same credential.
    Transient,
    /// Rate limit with a cooldown hint.
    Throttled(Duration),
    /// Authentication rejection.
    Auth,
    /// Upstream quota exhaustion.
    Quota,
    /// Non-retryable rejection.
    Permanent,
}

/// One scripted dispatch outcome, consumed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    /// Succeed with the adapter's default response.
    Succeed,
    /// Fail with the given kind.
    Fail(MockFailure),
}

/// Record of one `execute` invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Instant the adapter was invoked.
    pub at: DateTime<Utc>,
    /// Model from the intent.
    pub model: String,
    /// Length of the opened material the adapter received.
    pub material_len: usize,
}

type ExecuteFn =
    dyn Fn(&RequestIntent) -> Result<AdapterResponse, CentralinoError> + Send + Sync;
type EstimateFn = dyn Fn(&RequestIntent) -> Result<CostEstimate, CentralinoError> + Send + Sync;

/// Scriptable in-memory provider adapter.
pub struct MockAdapter {
    name: &'static str,
    price_per_1k: Decimal,
    usage: TokenUsage,
    latency: Duration,
    steps: Mutex<VecDeque<MockStep>>,
    calls: Mutex<Vec<CallRecord>>,
    execute_fn: Option<Arc<ExecuteFn>>,
    estimate_fn: Option<Arc<EstimateFn>>,
}

impl MockAdapter {
    /// A mock adapter named `name` that always succeeds.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            price_per_1k: Decimal::new(2, 3),
            usage: TokenUsage {
                input: 10,
                output: 20,
            },
            latency: Duration::ZERO,
            steps: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            execute_fn: None,
            estimate_fn: None,
        }
    }

    /// Set the per-1k-token price used by the default estimator.
    #[must_use]
    pub const fn with_price_per_1k(mut self, price: Decimal) -> Self {
        self.price_per_1k = price;
        self
    }

    /// Set the token usage reported on success.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Add artificial latency to every dispatch.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue scripted outcomes, consumed one per dispatch; an empty queue
    /// means success.
    #[must_use]
    pub fn with_steps(self, steps: impl IntoIterator<Item = MockStep>) -> Self {
        self.steps
            .lock()
            .expect("steps lock poisoned")
            .extend(steps);
        self
    }

    /// Override `execute` entirely.
    #[must_use]
    pub fn with_execute_fn(
        mut self,
        f: impl Fn(&RequestIntent) -> Result<AdapterResponse, CentralinoError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.execute_fn = Some(Arc::new(f));
        self
    }

    /// Override `estimate_cost` entirely.
    #[must_use]
    pub fn with_estimate_fn(
        mut self,
        f: impl Fn(&RequestIntent) -> Result<CostEstimate, CentralinoError> + Send + Sync + 'static,
    ) -> Self {
        self.estimate_fn = Some(Arc::new(f));
        self
    }

    /// Every `execute` invocation observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// Scripted steps not yet consumed.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.steps.lock().expect("steps lock poisoned").len()
    }

    fn default_response(&self, intent: &RequestIntent) -> AdapterResponse {
        let tokens = Decimal::from(self.usage.total());
        AdapterResponse {
            content: format!("{}: ok", self.name),
            model: intent.model.clone(),
            usage: self.usage,
            cost: Some(self.price_per_1k * tokens / Decimal::from(1000u64)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(
        &self,
        intent: &RequestIntent,
        material: &OpenedMaterial,
        _deadline: Duration,
    ) -> Result<AdapterResponse, CentralinoError> {
        self.calls.lock().expect("calls lock poisoned").push(CallRecord {
            at: Utc::now(),
            model: intent.model.clone(),
            material_len: material.as_bytes().len(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(f) = &self.execute_fn {
            return f(intent);
        }

        let step = self
            .steps
            .lock()
            .expect("steps lock poisoned")
            .pop_front()
            .unwrap_or(MockStep::Succeed);
        match step {
            MockStep::Succeed => Ok(self.default_response(intent)),
            MockStep::Fail(MockFailure::Transient) => {
                Err(CentralinoError::transient("connection reset by peer"))
            }
            MockStep::Fail(MockFailure::Throttled(cooldown)) => Err(CentralinoError::Throttled {
                cooldown_ms: u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
            }),
            MockStep::Fail(MockFailure::Auth) => Err(CentralinoError::AuthFailure {
                msg: "credential rejected upstream".to_string(),
            }),
            MockStep::Fail(MockFailure::Quota) => Err(CentralinoError::QuotaExceeded {
                msg: "upstream quota consumed".to_string(),
            }),
            MockStep::Fail(MockFailure::Permanent) => Err(CentralinoError::Permanent {
                msg: "upstream rejected the request".to_string(),
            }),
        }
    }

    fn estimate_cost(&self, intent: &RequestIntent) -> Result<CostEstimate, CentralinoError> {
        if let Some(f) = &self.estimate_fn {
            return f(intent);
        }
        let input_tokens = (intent.content_len() as u64).div_ceil(4);
        let output_tokens = self.usage.output;
        let tokens = Decimal::from(input_tokens + output_tokens);
        let amount = self.price_per_1k * tokens / Decimal::from(1000u64);
        Ok(CostEstimate {
            amount,
            adapter_amount: amount,
            input_tokens,
            output_tokens,
            source: EstimateSource::Adapter,
        })
    }

    fn classify_error(&self, error: &CentralinoError) -> ErrorDisposition {
        match error {
            CentralinoError::Throttled { cooldown_ms } => ErrorDisposition::Throttled {
                cooldown: Duration::from_millis(*cooldown_ms),
            },
            CentralinoError::AuthFailure { .. } | CentralinoError::Crypto(_) => {
                ErrorDisposition::Auth
            }
            CentralinoError::QuotaExceeded { .. } => ErrorDisposition::QuotaExceeded,
            CentralinoError::Transient { .. } | CentralinoError::Timeout { .. } => {
                ErrorDisposition::Transient
            }
            _ => ErrorDisposition::Permanent,
        }
    }

    fn price_table_version(&self) -> &'static str {
        "mock-prices-v1"
    }
}

/// Event sink that records everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    /// An empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().expect("events lock poisoned").clone()
    }

    /// Names of the recorded events, in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("events lock poisoned")
            .iter()
            .map(|e| e.event.name())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &EventEnvelope) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push(event.clone());
    }
}
