//! Routing objectives, candidate scores, and decision records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credential::CredentialId;

/// Primitive scoring dimension for ranking eligible credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Prefer the cheapest estimated dispatch.
    Cost,
    /// Prefer the highest smoothed success rate.
    Reliability,
    /// Prefer recently-idle, lightly-used credentials.
    Fairness,
    /// Prefer the lowest rolling median latency.
    Speed,
}

impl ObjectiveKind {
    /// Stable lowercase label used in explanations and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Reliability => "reliability",
            Self::Fairness => "fairness",
            Self::Speed => "speed",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weighted component of a composite objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeight {
    /// Primitive dimension.
    pub kind: ObjectiveKind,
    /// Non-negative weight; weights are normalized over the set.
    pub weight: f64,
}

/// The scoring function ranking eligible credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// Rank by one primitive dimension.
    Single(ObjectiveKind),
    /// Rank by a weighted sum of primitives, each min-max normalized over
    /// the candidate set. There is no normative default weighting; the
    /// operator supplies the weights.
    Composite(Vec<ObjectiveWeight>),
}

impl Objective {
    /// Cost objective.
    #[must_use]
    pub const fn cost() -> Self {
        Self::Single(ObjectiveKind::Cost)
    }

    /// Reliability objective.
    #[must_use]
    pub const fn reliability() -> Self {
        Self::Single(ObjectiveKind::Reliability)
    }

    /// Fairness objective.
    #[must_use]
    pub const fn fairness() -> Self {
        Self::Single(ObjectiveKind::Fairness)
    }

    /// Speed objective.
    #[must_use]
    pub const fn speed() -> Self {
        Self::Single(ObjectiveKind::Speed)
    }

    /// Composite objective over explicit weights.
    #[must_use]
    pub const fn composite(weights: Vec<ObjectiveWeight>) -> Self {
        Self::Composite(weights)
    }

    /// The primitive dimensions this objective evaluates.
    #[must_use]
    pub fn kinds(&self) -> Vec<ObjectiveKind> {
        match self {
            Self::Single(kind) => vec![*kind],
            Self::Composite(weights) => weights.iter().map(|w| w.kind).collect(),
        }
    }

    /// Label used in events, metrics, and explanations.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Single(kind) => kind.as_str().to_string(),
            Self::Composite(_) => "composite".to_string(),
        }
    }

    /// Whether the weight set is usable: non-empty, no negative weights,
    /// positive sum.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Single(_) => true,
            Self::Composite(weights) => {
                !weights.is_empty()
                    && weights.iter().all(|w| w.weight >= 0.0)
                    && weights.iter().map(|w| w.weight).sum::<f64>() > 0.0
            }
        }
    }
}

/// Per-candidate scoring detail recorded on the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Candidate credential.
    pub credential_id: CredentialId,
    /// Raw per-dimension scores (higher is better).
    pub raw: Vec<(ObjectiveKind, f64)>,
    /// Final comparable score after normalization and policy bias.
    pub total: f64,
}

/// Durable record of one credential selection, persisted before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Record id.
    pub id: Uuid,
    /// Instant the decision was made.
    pub at: DateTime<Utc>,
    /// Fingerprint of the request (never the request body).
    pub fingerprint: String,
    /// Correlation id propagated from the intent.
    pub correlation_id: String,
    /// Credential the decision selected.
    pub chosen: CredentialId,
    /// Every candidate that survived the eligibility gates.
    pub candidates: Vec<CredentialId>,
    /// Objective that ranked the candidates.
    pub objective: Objective,
    /// Scoring detail per candidate.
    pub scores: Vec<CandidateScore>,
    /// Candidates tied with the winner before the deterministic break.
    pub tied: Vec<CredentialId>,
    /// Human-readable explanation; never empty.
    pub explanation: String,
}

/// Why no candidate was eligible, broken down for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityBreakdown {
    /// Credentials administratively disabled.
    pub disabled: usize,
    /// Credentials marked invalid.
    pub invalid: usize,
    /// Credentials cooling down after a throttle.
    pub throttled: usize,
    /// Credentials out of capacity.
    pub exhausted: usize,
    /// Credentials excluded by a selection policy or cost rule.
    pub policy_blocked: usize,
    /// Credentials blocked by a hard budget.
    pub budget_blocked: usize,
    /// Credentials excluded after failing earlier in the same route call.
    pub excluded: usize,
}

impl EligibilityBreakdown {
    /// Total credentials considered and rejected.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.disabled
            + self.invalid
            + self.throttled
            + self.exhausted
            + self.policy_blocked
            + self.budget_blocked
            + self.excluded
    }
}

impl fmt::Display for EligibilityBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} disabled, {} invalid, {} throttled, {} exhausted, {} policy-blocked, {} budget-blocked, {} excluded",
            self.disabled,
            self.invalid,
            self.throttled,
            self.exhausted,
            self.policy_blocked,
            self.budget_blocked,
            self.excluded
        )
    }
}
