//! Candidate gathering, objective scoring, and decision records.
//!
//! Eligibility is the conjunction of every gate: state Available, no
//! capacity window Exhausted, selection policies allow, cost rules and
//! hard budgets permit. Survivors are scored under the objective,
//! normalized per dimension over the candidate set, biased by routing
//! rules, and the winner is picked with a deterministic tie-break:
//! success rate, then usage count, then id.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use centralino_core::{CentralinoError, ProviderAdapter};
use centralino_types::{
    CandidateScore, CapacityTier, CostEstimate, Credential, CredentialId, EligibilityBreakdown,
    EventEnvelope, KeyState, Objective, ObjectiveKind, PolicySet, PolicyVerdict, RequestIntent,
    RouterConfig, RouterEvent, RoutingDecision, TransitionReason,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::core::Centralino;

const SCORE_TIE_EPSILON: f64 = 1e-9;
const LATENCY_SAMPLE_CAP: usize = 64;

/// A candidate that survived every eligibility gate.
pub(crate) struct Candidate {
    pub credential: Arc<Credential>,
    pub estimate: CostEstimate,
    pub verdict: PolicyVerdict,
}

/// One scored candidate, referencing the pool by index.
pub(crate) struct Ranked {
    pub index: usize,
    pub raw: Vec<(ObjectiveKind, f64)>,
    pub total: f64,
}

/// Outcome of a decision: the persisted record plus what the dispatch
/// path needs about the winner.
pub(crate) struct Selected {
    pub decision: RoutingDecision,
    pub estimate: CostEstimate,
    pub credential: Arc<Credential>,
}

/// Rolling per-credential latency medians feeding the Speed objective.
pub(crate) struct LatencyBook {
    samples: Mutex<HashMap<CredentialId, VecDeque<f64>>>,
}

impl LatencyBook {
    pub(crate) fn new() -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn record(&self, id: &CredentialId, elapsed: Duration) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let series = samples.entry(id.clone()).or_default();
        series.push_back(elapsed.as_secs_f64() * 1000.0);
        while series.len() > LATENCY_SAMPLE_CAP {
            series.pop_front();
        }
    }

    fn p50(series: &VecDeque<f64>) -> Option<f64> {
        if series.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = series.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Some(sorted[sorted.len() / 2])
    }

    pub(crate) fn p50_map(&self) -> HashMap<CredentialId, f64> {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples
            .iter()
            .filter_map(|(id, series)| Self::p50(series).map(|p| (id.clone(), p)))
            .collect()
    }
}

impl Centralino {
    /// Gather eligible candidates, score them, persist the decision, and
    /// return the winner. The decision record is committed to the store
    /// before this returns; dispatch never precedes it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "centralino::router::decide",
            skip(self, intent, objective, policies, adapter, excluded),
            fields(provider = %intent.provider, objective = %objective.label()),
        )
    )]
    pub(crate) async fn decide(
        &self,
        intent: &RequestIntent,
        objective: &Objective,
        policies: &PolicySet,
        adapter: &Arc<dyn ProviderAdapter>,
        excluded: &HashSet<CredentialId>,
    ) -> Result<Selected, CentralinoError> {
        let started = Instant::now();
        let now = Utc::now();
        let mut breakdown = EligibilityBreakdown::default();
        let mut first_blocking: Option<(String, rust_decimal::Decimal)> = None;
        let mut pool: Vec<Candidate> = Vec::new();

        for credential in self.manager.poll_provider(&intent.provider, now).await? {
            if excluded.contains(&credential.id) {
                breakdown.excluded += 1;
                continue;
            }
            match credential.state {
                KeyState::Disabled => {
                    breakdown.disabled += 1;
                    continue;
                }
                KeyState::Invalid => {
                    breakdown.invalid += 1;
                    continue;
                }
                KeyState::Throttled => {
                    breakdown.throttled += 1;
                    continue;
                }
                KeyState::Exhausted | KeyState::Available => {}
            }

            let (tier, _) = self.quota.refresh(&credential.id, now).await?;
            let credential = if credential.state == KeyState::Exhausted {
                // Quota-engine-driven recovery: a window reset (or raised
                // capacity) restores eligibility.
                let restored = !self.quota.windows_for(&credential.id).is_empty()
                    && tier != CapacityTier::Exhausted;
                if !restored {
                    breakdown.exhausted += 1;
                    continue;
                }
                self.manager
                    .transition(
                        &credential.id,
                        KeyState::Available,
                        TransitionReason::WindowReset,
                        "capacity window reset".to_string(),
                        None,
                    )
                    .await?;
                match self.manager.get(&credential.id) {
                    Some(fresh) => fresh,
                    None => credential,
                }
            } else {
                credential
            };
            if tier == CapacityTier::Exhausted {
                breakdown.exhausted += 1;
                continue;
            }

            let verdict = policies.evaluate(intent, &credential);
            if !verdict.allowed {
                breakdown.policy_blocked += 1;
                continue;
            }

            let estimate = self.cost.estimate(intent, &credential, adapter.as_ref())?;
            if let Some(limit) = verdict.max_cost_per_request
                && estimate.amount > limit
            {
                breakdown.policy_blocked += 1;
                continue;
            }
            let budget_check = self.cost.check(intent, &credential, &estimate, now);
            if !budget_check.allowed {
                breakdown.budget_blocked += 1;
                if first_blocking.is_none()
                    && let Some(blocking) = budget_check.blocking
                {
                    first_blocking = Some((
                        blocking.to_string(),
                        budget_check.remaining.unwrap_or_default(),
                    ));
                }
                continue;
            }

            pool.push(Candidate {
                credential,
                estimate,
                verdict,
            });
        }

        if pool.is_empty() {
            // When a hard budget is the only gate in the way, surface it as
            // such; operators act on BudgetExceeded differently than on a
            // drained pool.
            if let Some((budget, remaining)) = first_blocking
                && breakdown.total() == breakdown.budget_blocked
            {
                return Err(CentralinoError::BudgetExceeded { budget, remaining });
            }
            return Err(CentralinoError::NoEligibleCandidates { breakdown });
        }

        let ranked = rank(&pool, objective, now, &self.cfg, &self.stats.p50_map());
        let best = &ranked[0];
        let tied: Vec<CredentialId> = if ranked.len() > 1
            && (ranked[1].total - best.total).abs() < SCORE_TIE_EPSILON
        {
            ranked
                .iter()
                .filter(|r| (r.total - best.total).abs() < SCORE_TIE_EPSILON)
                .map(|r| pool[r.index].credential.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        let explanation = explain(objective, &pool, &ranked, tied.len());

        let decision = RoutingDecision {
            id: Uuid::new_v4(),
            at: now,
            fingerprint: intent.fingerprint(),
            correlation_id: intent.correlation_id.clone(),
            chosen: pool[best.index].credential.id.clone(),
            candidates: pool.iter().map(|c| c.credential.id.clone()).collect(),
            objective: objective.clone(),
            scores: ranked
                .iter()
                .map(|r| CandidateScore {
                    credential_id: pool[r.index].credential.id.clone(),
                    raw: r.raw.clone(),
                    total: r.total,
                })
                .collect(),
            tied,
            explanation,
        };

        // A durable record precedes action: the store write failing aborts
        // the route before any dispatch.
        self.store.save_decision(&decision).await?;
        self.sink.emit(&EventEnvelope::correlated(
            RouterEvent::DecisionRecorded {
                decision_id: decision.id,
                credential_id: decision.chosen.clone(),
            },
            intent.correlation_id.clone(),
        ));
        crate::metrics::record_decision_duration(started.elapsed());

        let winner = best.index;
        Ok(Selected {
            decision,
            estimate: pool[winner].estimate.clone(),
            credential: Arc::clone(&pool[winner].credential),
        })
    }
}

fn reliability_score(candidate: &Candidate, now: DateTime<Utc>, cfg: &RouterConfig) -> f64 {
    let mut rate = candidate.credential.success_rate();
    if let Some(last_failure) = candidate.credential.last_failure_at {
        let since = (now - last_failure).num_milliseconds().max(0) as u128;
        if since < cfg.failure_penalty_window.as_millis() {
            rate *= 0.5;
        }
    }
    rate
}

fn fairness_score(candidate: &Candidate, now: DateTime<Utc>, cfg: &RouterConfig) -> f64 {
    let usage = candidate.credential.usage_count() as f64;
    let decay = match candidate.credential.last_used_at {
        None => 1.0,
        Some(last_used) => {
            let idle_secs = (now - last_used).num_milliseconds().max(0) as f64 / 1000.0;
            let half_life = cfg.fairness_half_life.as_secs_f64().max(f64::EPSILON);
            0.5_f64.powf(idle_secs / half_life)
        }
    };
    -(usage * decay)
}

/// Raw Speed scores for the whole pool. Candidates without latency data
/// inherit the worst observed median; with no data at all the dimension
/// falls back to Reliability.
fn speed_scores(
    pool: &[Candidate],
    now: DateTime<Utc>,
    cfg: &RouterConfig,
    p50s: &HashMap<CredentialId, f64>,
) -> Vec<f64> {
    let known: Vec<Option<f64>> = pool
        .iter()
        .map(|c| p50s.get(&c.credential.id).copied())
        .collect();
    if known.iter().all(Option::is_none) {
        return pool
            .iter()
            .map(|c| reliability_score(c, now, cfg))
            .collect();
    }
    let worst = known
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, latency| acc.max(*latency));
    known
        .into_iter()
        .map(|latency| -latency.unwrap_or(worst))
        .collect()
}

fn raw_scores_for(
    kind: ObjectiveKind,
    pool: &[Candidate],
    now: DateTime<Utc>,
    cfg: &RouterConfig,
    p50s: &HashMap<CredentialId, f64>,
) -> Vec<f64> {
    match kind {
        ObjectiveKind::Cost => pool
            .iter()
            .map(|c| -c.estimate.amount.to_f64().unwrap_or(f64::MAX))
            .collect(),
        ObjectiveKind::Reliability => pool
            .iter()
            .map(|c| reliability_score(c, now, cfg))
            .collect(),
        ObjectiveKind::Fairness => pool.iter().map(|c| fairness_score(c, now, cfg)).collect(),
        ObjectiveKind::Speed => speed_scores(pool, now, cfg, p50s),
    }
}

/// Min-max normalize to [0, 1]; a degenerate spread maps everyone to 1.
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    if !spread.is_finite() || spread.abs() < f64::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / spread).collect()
}

/// Score and order the pool best-first under the objective, with the
/// deterministic tie-break chain.
pub(crate) fn rank(
    pool: &[Candidate],
    objective: &Objective,
    now: DateTime<Utc>,
    cfg: &RouterConfig,
    p50s: &HashMap<CredentialId, f64>,
) -> Vec<Ranked> {
    let weighted: Vec<(ObjectiveKind, f64)> = match objective {
        Objective::Single(kind) => vec![(*kind, 1.0)],
        Objective::Composite(weights) => {
            let sum: f64 = weights.iter().map(|w| w.weight).sum();
            weights
                .iter()
                .map(|w| (w.kind, w.weight / sum))
                .collect()
        }
    };

    let raw_by_kind: Vec<Vec<f64>> = weighted
        .iter()
        .map(|(kind, _)| raw_scores_for(*kind, pool, now, cfg, p50s))
        .collect();
    let norm_by_kind: Vec<Vec<f64>> = raw_by_kind.iter().map(|raw| normalize(raw)).collect();

    let mut ranked: Vec<Ranked> = (0..pool.len())
        .map(|i| {
            let mut total: f64 = weighted
                .iter()
                .enumerate()
                .map(|(j, (_, weight))| weight * norm_by_kind[j][i])
                .sum();
            total += pool[i].verdict.bias;
            if let Some(floor) = pool[i].verdict.min_success_rate
                && pool[i].credential.success_rate() < floor
            {
                total -= 1.0;
            }
            Ranked {
                index: i,
                raw: weighted
                    .iter()
                    .enumerate()
                    .map(|(j, (kind, _))| (*kind, raw_by_kind[j][i]))
                    .collect(),
                total,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        let ca = &pool[a.index].credential;
        let cb = &pool[b.index].credential;
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then(
                cb.success_rate()
                    .partial_cmp(&ca.success_rate())
                    .unwrap_or(Ordering::Equal),
            )
            .then(ca.usage_count().cmp(&cb.usage_count()))
            .then(ca.id.cmp(&cb.id))
    });
    ranked
}

fn explain(pool_objective: &Objective, pool: &[Candidate], ranked: &[Ranked], tied: usize) -> String {
    let winner = &pool[ranked[0].index];
    let id = &winner.credential.id;
    let n = pool.len();

    let mut explanation = if n == 1 {
        "only candidate".to_string()
    } else {
        match pool_objective {
            Objective::Single(ObjectiveKind::Cost) => format!(
                "cost objective: selected {id} at estimated cost {} (cheapest of {n} candidates)",
                winner.estimate.amount
            ),
            Objective::Single(ObjectiveKind::Reliability) => format!(
                "reliability objective: selected {id} with success rate {:.3} of {n} candidates",
                winner.credential.success_rate()
            ),
            Objective::Single(ObjectiveKind::Fairness) => format!(
                "fairness objective: selected {id} as least recently loaded ({} uses, {n} candidates)",
                winner.credential.usage_count()
            ),
            Objective::Single(ObjectiveKind::Speed) => format!(
                "speed objective: selected {id} with the lowest rolling latency of {n} candidates"
            ),
            Objective::Composite(_) => format!(
                "composite objective: selected {id} with weighted score {:.3} over {n} candidates",
                ranked[0].total
            ),
        }
    };
    if tied > 1 {
        explanation.push_str(&format!(
            "; {tied}-way tie broken by success rate, usage, id"
        ));
    }
    explanation
}
