//! Administrative metrics emitted through the `metrics` facade.
//!
//! The router only emits; the embedding process decides the recorder
//! (Prometheus exporter, statsd, nothing). Label cardinality is bounded:
//! objectives, states, and error kinds are closed sets, and budgets are
//! operator-configured.

use std::time::Duration;

use centralino_types::{Budget, KeyState};

pub(crate) fn record_request(objective: &str) {
    metrics::counter!("centralino_requests_total", "objective" => objective.to_string())
        .increment(1);
}

pub(crate) fn record_route_duration(elapsed: Duration) {
    metrics::histogram!("centralino_route_duration_seconds").record(elapsed.as_secs_f64());
}

pub(crate) fn record_decision_duration(elapsed: Duration) {
    metrics::histogram!("centralino_decision_duration_seconds").record(elapsed.as_secs_f64());
}

pub(crate) fn record_attempts(attempts: u32) {
    metrics::histogram!("centralino_route_attempts").record(f64::from(attempts));
}

pub(crate) fn record_retry(reason: &'static str) {
    metrics::counter!("centralino_retries_total", "reason" => reason).increment(1);
}

pub(crate) fn set_state_gauges(counts: &[(KeyState, usize)]) {
    for (state, count) in counts {
        metrics::gauge!("centralino_credentials", "state" => state.as_str())
            .set(*count as f64);
    }
}

pub(crate) fn set_budget_utilization(budget: &Budget) {
    metrics::gauge!(
        "centralino_budget_utilization",
        "budget" => budget.id.as_str().to_string(),
        "scope" => budget.scope.to_string()
    )
    .set(budget.utilization());
}
