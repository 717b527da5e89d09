//! Cost estimation, budget enforcement, and estimate/actual reconciliation.
//!
//! All monetary arithmetic is `Decimal`. The route path is two-phase:
//! eligibility `check`s are read-only; once a candidate is selected its
//! estimate is `reserve`d against every applicable budget before dispatch,
//! and `reconcile` (success) or `release` (failure) settles the
//! reservation afterwards. Hard budgets can therefore never be overrun by
//! more than the estimates already in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use centralino_core::{CentralinoError, EventSink, ProviderAdapter};
use centralino_types::{
    Budget, BudgetDecision, BudgetId, BudgetScope, CostEstimate, Credential, EnforcementMode,
    EstimateSource, EventEnvelope, ProviderKey, RequestIntent, RouterEvent, TimeWindow,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// EWMA weight of the newest actual/estimate ratio.
fn calibration_alpha() -> Decimal {
    Decimal::new(3, 1)
}

pub(crate) struct CostController {
    budgets: Mutex<HashMap<BudgetId, Budget>>,
    calibration: Mutex<HashMap<(ProviderKey, String), Decimal>>,
    sink: Arc<dyn EventSink>,
}

impl CostController {
    pub(crate) fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            budgets: Mutex::new(HashMap::new()),
            calibration: Mutex::new(HashMap::new()),
            sink,
        }
    }

    /// Create a budget and return it.
    pub(crate) fn create_budget(
        &self,
        scope: BudgetScope,
        limit: Decimal,
        window: TimeWindow,
        enforcement: EnforcementMode,
        now: DateTime<Utc>,
    ) -> Budget {
        let budget = Budget {
            id: BudgetId::generate(),
            scope,
            limit,
            window,
            enforcement,
            spent: Decimal::ZERO,
            window_started_at: now,
        };
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        budgets.insert(budget.id.clone(), budget.clone());
        budget
    }

    /// Every configured budget, rollovers applied.
    pub(crate) fn budgets(&self) -> Vec<Budget> {
        let now = Utc::now();
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        for budget in budgets.values_mut() {
            Self::roll_if_due(budget, now);
        }
        let mut out: Vec<Budget> = budgets.values().cloned().collect();
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        out
    }

    fn roll_if_due(budget: &mut Budget, now: DateTime<Utc>) {
        if budget.rollover_due(now) {
            budget.spent = Decimal::ZERO;
            budget.window_started_at = now;
        }
    }

    fn calibration_factor(&self, provider: &ProviderKey, model: &str) -> Decimal {
        let calibration = self.calibration.lock().unwrap_or_else(|e| e.into_inner());
        calibration
            .get(&(provider.clone(), model.to_string()))
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Estimate the cost of dispatching `intent` through `credential`.
    ///
    /// The adapter's price table is the default source; a `cost_per_1k`
    /// metadata hint on the credential overrides it outright. Adapter
    /// figures are multiplied by the per-(provider, model) calibration
    /// factor learned from reconciliation.
    pub(crate) fn estimate(
        &self,
        intent: &RequestIntent,
        credential: &Credential,
        adapter: &dyn ProviderAdapter,
    ) -> Result<CostEstimate, CentralinoError> {
        let base = adapter.estimate_cost(intent)?;
        if let Some(per_1k) = credential.cost_hint() {
            let tokens = Decimal::from(base.input_tokens + base.output_tokens);
            return Ok(CostEstimate {
                amount: per_1k * tokens / Decimal::from(1000u64),
                adapter_amount: base.adapter_amount,
                input_tokens: base.input_tokens,
                output_tokens: base.output_tokens,
                source: EstimateSource::Metadata,
            });
        }
        let factor = self.calibration_factor(&credential.provider, &intent.model);
        Ok(CostEstimate {
            amount: base.amount * factor,
            adapter_amount: base.adapter_amount,
            input_tokens: base.input_tokens,
            output_tokens: base.output_tokens,
            source: EstimateSource::Adapter,
        })
    }

    /// Read-only check of an estimate against every applicable budget.
    pub(crate) fn check(
        &self,
        intent: &RequestIntent,
        credential: &Credential,
        estimate: &CostEstimate,
        now: DateTime<Utc>,
    ) -> BudgetDecision {
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        let mut decision = BudgetDecision::unconstrained();
        for budget in budgets.values_mut() {
            if !budget.scope.applies_to(intent, credential) {
                continue;
            }
            Self::roll_if_due(budget, now);
            let remaining = budget.remaining();
            decision.remaining = Some(match decision.remaining {
                Some(current) => current.min(remaining),
                None => remaining,
            });
            if budget.would_exceed(estimate.amount) {
                match budget.enforcement {
                    EnforcementMode::Hard => {
                        if decision.blocking.is_none() {
                            decision.allowed = false;
                            decision.blocking = Some(budget.id.clone());
                        }
                    }
                    EnforcementMode::Soft => decision.breached.push(budget.id.clone()),
                }
            }
        }
        decision
    }

    /// Reserve an estimate against every applicable budget, re-verifying
    /// hard limits under the lock. The reservation is settled later by
    /// `reconcile` or returned by `release`.
    pub(crate) fn reserve(
        &self,
        intent: &RequestIntent,
        credential: &Credential,
        estimate: &CostEstimate,
        now: DateTime<Utc>,
    ) -> Result<(), CentralinoError> {
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        for budget in budgets.values_mut() {
            if !budget.scope.applies_to(intent, credential) {
                continue;
            }
            Self::roll_if_due(budget, now);
            if budget.enforcement == EnforcementMode::Hard
                && budget.would_exceed(estimate.amount)
            {
                return Err(CentralinoError::BudgetExceeded {
                    budget: budget.id.to_string(),
                    remaining: budget.remaining(),
                });
            }
        }
        for budget in budgets.values_mut() {
            if budget.scope.applies_to(intent, credential) {
                budget.spent += estimate.amount;
            }
        }
        Ok(())
    }

    /// Return a reservation after a failed dispatch.
    pub(crate) fn release(
        &self,
        intent: &RequestIntent,
        credential: &Credential,
        estimate: &CostEstimate,
    ) {
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        for budget in budgets.values_mut() {
            if budget.scope.applies_to(intent, credential) {
                budget.spent = (budget.spent - estimate.amount).max(Decimal::ZERO);
            }
        }
    }

    /// Replace a reservation with the actual cost, flag soft breaches,
    /// and feed the actual/estimate ratio into the calibration factor for
    /// the (provider, model) pair.
    pub(crate) fn reconcile(
        &self,
        intent: &RequestIntent,
        credential: &Credential,
        estimate: &CostEstimate,
        actual: Decimal,
    ) {
        {
            let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
            for budget in budgets.values_mut() {
                if !budget.scope.applies_to(intent, credential) {
                    continue;
                }
                // Compare against the spend as it stood before this
                // request's reservation, so a breach introduced by the
                // reservation itself is still reported exactly once.
                let settled_before = (budget.spent - estimate.amount).max(Decimal::ZERO);
                budget.spent = (settled_before + actual).max(Decimal::ZERO);
                if budget.spent > budget.limit && settled_before <= budget.limit {
                    self.sink.emit(&EventEnvelope::new(RouterEvent::BudgetBreached {
                        budget_id: budget.id.clone(),
                        spent: budget.spent,
                        limit: budget.limit,
                    }));
                }
                crate::metrics::set_budget_utilization(budget);
            }
        }

        if estimate.source == EstimateSource::Adapter && estimate.adapter_amount > Decimal::ZERO {
            let ratio = actual / estimate.adapter_amount;
            let alpha = calibration_alpha();
            let mut calibration = self.calibration.lock().unwrap_or_else(|e| e.into_inner());
            let key = (credential.provider.clone(), intent.model.clone());
            let factor = calibration.get(&key).copied().unwrap_or(Decimal::ONE);
            calibration.insert(key, alpha * ratio + (Decimal::ONE - alpha) * factor);
        }
    }
}
