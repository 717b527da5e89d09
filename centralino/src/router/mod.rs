//! The route orchestration: validate, decide, dispatch, classify, retry.
//!
//! The attempt loop is an explicit state machine so attempt counts stay
//! auditable: each iteration makes (at most) one dispatch, and every
//! failure is classified by the provider adapter into a disposition that
//! decides between same-credential retry with backoff, failover to a
//! different credential with a state transition, or surfacing to the
//! caller.

mod backoff;
pub(crate) mod engine;

use std::collections::HashSet;
use std::time::Instant;

use centralino_core::{AdapterResponse, CentralinoError, ErrorDisposition};
use centralino_types::{
    CredentialId, EventEnvelope, KeyState, RequestIntent, RouteReceipt, RouterEvent, TimeWindow,
    TransitionReason,
};
use chrono::Utc;

use crate::core::Centralino;
use crate::router::backoff::Backoff;
use crate::router::engine::Selected;

impl Centralino {
    /// Route one intent: select a credential under the objective, dispatch
    /// through the provider adapter, record the outcome, and return a
    /// receipt.
    ///
    /// Behavior and trade-offs:
    /// - The routing decision is persisted before the adapter is called; a
    ///   store failure aborts the route with `Internal` and nothing is
    ///   dispatched.
    /// - Transient failures retry the same credential with jittered
    ///   exponential backoff; throttle/quota/auth failures transition the
    ///   credential and fail over to a different one; permanent failures
    ///   surface immediately.
    /// - Attempts are bounded by `RetryConfig::max_attempts` per call, and
    ///   `RouterConfig::request_timeout` (when set) bounds the whole call.
    ///   A timed-out dispatch penalizes no counters: with no outcome
    ///   observable upstream, the credential is not blamed.
    ///
    /// # Errors
    /// `Validation`/`UnknownProvider` for malformed intents,
    /// `NoEligibleCandidates` with a reason breakdown when every credential
    /// is gated off, `BudgetExceeded` under hard enforcement, `Timeout`
    /// when the deadline elapses, and the terminal upstream error kind
    /// otherwise (aggregated as `AllCandidatesFailed` when several
    /// credentials failed).
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "centralino::router::route",
            skip(self, intent),
            fields(provider = %intent.provider, model = %intent.model),
        )
    )]
    pub async fn route(&self, intent: &RequestIntent) -> Result<RouteReceipt, CentralinoError> {
        let route_started = Instant::now();
        let overall_deadline = self.cfg.request_timeout.map(|limit| route_started + limit);

        self.validate_intent(intent)?;
        let adapter = self.adapter_for(&intent.provider)?;
        let objective = intent
            .objective
            .clone()
            .unwrap_or_else(|| self.cfg.default_objective.clone());
        if !objective.is_valid() {
            return Err(CentralinoError::validation(
                "objective has an empty or negative weight set",
            ));
        }
        let policies = self.active_policies();

        self.sink.emit(&EventEnvelope::correlated(
            RouterEvent::RequestStarted {
                provider: intent.provider.clone(),
                model: intent.model.clone(),
            },
            intent.correlation_id.clone(),
        ));
        crate::metrics::record_request(&objective.label());

        let mut excluded: HashSet<CredentialId> = HashSet::new();
        let mut failures: Vec<CentralinoError> = Vec::new();
        let mut backoff = Backoff::new(self.cfg.retry.backoff);
        let mut attempt: u32 = 0;
        let mut last_credential: Option<CredentialId> = None;

        let outcome = loop {
            if attempt >= self.cfg.retry.max_attempts {
                break Err(terminal_error(failures));
            }
            attempt += 1;

            let selected = match self
                .decide(intent, &objective, &policies, &adapter, &excluded)
                .await
            {
                Ok(selected) => selected,
                Err(err) => {
                    if failures.is_empty() {
                        break Err(err);
                    }
                    failures.push(err);
                    break Err(terminal_error(failures));
                }
            };
            let credential_id = selected.decision.chosen.clone();
            last_credential = Some(credential_id.clone());

            if let Err(err) =
                self.cost
                    .reserve(intent, &selected.credential, &selected.estimate, Utc::now())
            {
                // Lost a reservation race since the eligibility check;
                // treat the candidate as budget-blocked for this call.
                excluded.insert(credential_id);
                failures.push(err);
                continue;
            }

            let material = match self.manager.unseal(&credential_id) {
                Ok(material) => material,
                Err(err) => {
                    self.cost
                        .release(intent, &selected.credential, &selected.estimate);
                    let _ = self
                        .manager
                        .transition(
                            &credential_id,
                            KeyState::Invalid,
                            TransitionReason::Crypto,
                            "sealed material failed to open".to_string(),
                            None,
                        )
                        .await;
                    excluded.insert(credential_id);
                    failures.push(err);
                    continue;
                }
            };

            let per_attempt = match overall_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.cost
                            .release(intent, &selected.credential, &selected.estimate);
                        break Err(CentralinoError::timeout("route"));
                    }
                    remaining.min(self.cfg.provider_timeout)
                }
                None => self.cfg.provider_timeout,
            };

            let call_started = Instant::now();
            let dispatch =
                tokio::time::timeout(per_attempt, adapter.execute(intent, &material, per_attempt))
                    .await;
            drop(material);

            match dispatch {
                Err(_) => {
                    // Deadline elapsed mid-flight: release the reservation
                    // and leave the counters alone.
                    self.cost
                        .release(intent, &selected.credential, &selected.estimate);
                    crate::metrics::record_retry("timeout");
                    failures.push(CentralinoError::timeout("provider call"));
                    if overall_deadline
                        .is_some_and(|deadline| Instant::now() >= deadline)
                    {
                        break Err(CentralinoError::timeout("route"));
                    }
                    if attempt < self.cfg.retry.max_attempts {
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
                Ok(Ok(response)) => {
                    let receipt = self
                        .finish_success(
                            intent,
                            selected,
                            response,
                            call_started.elapsed(),
                            route_started,
                            attempt,
                        )
                        .await;
                    break Ok(receipt);
                }
                Ok(Err(upstream)) => {
                    self.cost
                        .release(intent, &selected.credential, &selected.estimate);
                    let _ = self
                        .manager
                        .record_outcome(&credential_id, false, Utc::now())
                        .await;
                    let disposition = adapter.classify_error(&upstream);
                    match disposition {
                        ErrorDisposition::Transient => {
                            crate::metrics::record_retry("transient");
                            failures.push(upstream);
                            if attempt < self.cfg.retry.max_attempts {
                                tokio::time::sleep(backoff.next_delay()).await;
                            }
                        }
                        ErrorDisposition::Throttled { cooldown } => {
                            crate::metrics::record_retry("throttled");
                            let cooldown = if cooldown.is_zero() {
                                self.cfg.default_cooldown
                            } else {
                                cooldown
                            };
                            let until = Utc::now()
                                + chrono::Duration::from_std(cooldown)
                                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
                            let _ = self
                                .manager
                                .transition(
                                    &credential_id,
                                    KeyState::Throttled,
                                    TransitionReason::RateLimit,
                                    format!("cooldown until {until}"),
                                    Some(until),
                                )
                                .await;
                            excluded.insert(credential_id);
                            failures.push(upstream);
                        }
                        ErrorDisposition::QuotaExceeded => {
                            crate::metrics::record_retry("quota_exceeded");
                            let _ = self
                                .manager
                                .transition(
                                    &credential_id,
                                    KeyState::Exhausted,
                                    TransitionReason::Quota,
                                    "upstream reported quota exhausted".to_string(),
                                    None,
                                )
                                .await;
                            excluded.insert(credential_id);
                            failures.push(upstream);
                        }
                        ErrorDisposition::Auth => {
                            crate::metrics::record_retry("auth");
                            let _ = self
                                .manager
                                .transition(
                                    &credential_id,
                                    KeyState::Invalid,
                                    TransitionReason::Auth,
                                    "upstream rejected authentication".to_string(),
                                    None,
                                )
                                .await;
                            excluded.insert(credential_id);
                            failures.push(upstream);
                        }
                        ErrorDisposition::Permanent => {
                            break Err(upstream);
                        }
                    }
                }
            }
        };

        crate::metrics::record_attempts(attempt);
        crate::metrics::record_route_duration(route_started.elapsed());

        match outcome {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                self.sink.emit(&EventEnvelope::correlated(
                    RouterEvent::RequestFailed {
                        credential_id: last_credential,
                        kind: err.kind().to_string(),
                    },
                    intent.correlation_id.clone(),
                ));
                Err(err)
            }
        }
    }

    /// Route a batch of intents concurrently, aggregating outcomes.
    ///
    /// Returns `(receipts, failures)` so partial success never fails the
    /// whole batch.
    pub async fn route_many(
        &self,
        intents: &[RequestIntent],
    ) -> (Vec<RouteReceipt>, Vec<(RequestIntent, CentralinoError)>) {
        if intents.is_empty() {
            return (vec![], vec![]);
        }
        let tasks = intents.iter().map(|intent| {
            let intent = intent.clone();
            async move {
                let result = self.route(&intent).await;
                (intent, result)
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut receipts = Vec::new();
        let mut failures = Vec::new();
        for (intent, result) in results {
            match result {
                Ok(receipt) => receipts.push(receipt),
                Err(err) => failures.push((intent, err)),
            }
        }
        (receipts, failures)
    }

    fn validate_intent(&self, intent: &RequestIntent) -> Result<(), CentralinoError> {
        if intent.model.trim().is_empty() {
            return Err(CentralinoError::validation("intent has an empty model id"));
        }
        if intent.messages.is_empty() {
            return Err(CentralinoError::validation("intent has no messages"));
        }
        if intent.correlation_id.trim().is_empty() {
            return Err(CentralinoError::validation(
                "intent has an empty correlation id",
            ));
        }
        Ok(())
    }

    /// Post-success bookkeeping: counters, capacity observation (driving
    /// the Exhausted transition when a window fills), cost reconciliation,
    /// latency sample, event. Bookkeeping failures here never void the
    /// upstream response; the store holds derived state that the next
    /// write refreshes.
    async fn finish_success(
        &self,
        intent: &RequestIntent,
        selected: Selected,
        response: AdapterResponse,
        call_elapsed: std::time::Duration,
        route_started: Instant,
        attempts: u32,
    ) -> RouteReceipt {
        let now = Utc::now();
        let credential_id = selected.decision.chosen.clone();

        let _ = self
            .manager
            .record_outcome(&credential_id, true, now)
            .await;

        let mut windows = self.quota.windows_for(&credential_id);
        if windows.is_empty() {
            windows.push(TimeWindow::Daily);
        }
        for window in windows {
            if let Ok(outcome) = self
                .quota
                .observe(&credential_id, window, response.usage.total(), now)
                .await
                && outcome.became_exhausted
            {
                let _ = self
                    .manager
                    .transition(
                        &credential_id,
                        KeyState::Exhausted,
                        TransitionReason::Quota,
                        format!("{window} capacity consumed"),
                        None,
                    )
                    .await;
            }
        }

        let actual = response.cost.unwrap_or(selected.estimate.amount);
        self.cost
            .reconcile(intent, &selected.credential, &selected.estimate, actual);
        self.stats.record(&credential_id, call_elapsed);

        let elapsed = route_started.elapsed();
        self.sink.emit(&EventEnvelope::correlated(
            RouterEvent::RequestSucceeded {
                credential_id: credential_id.clone(),
                cost: actual,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            },
            intent.correlation_id.clone(),
        ));

        RouteReceipt {
            content: response.content,
            credential_id,
            model: response.model,
            usage: response.usage,
            cost: actual,
            elapsed,
            attempts,
            decision_id: selected.decision.id,
        }
    }
}

fn terminal_error(mut failures: Vec<CentralinoError>) -> CentralinoError {
    if !failures.is_empty()
        && failures
            .iter()
            .all(|e| matches!(e, CentralinoError::Timeout { .. }))
    {
        return CentralinoError::timeout("provider call");
    }
    match failures.len() {
        0 => CentralinoError::internal("route ended without a recorded failure"),
        1 => failures.remove(0),
        _ => CentralinoError::AllCandidatesFailed(failures),
    }
}
