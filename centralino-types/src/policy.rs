//! Scoped declarative policies filtering and biasing credential selection.
//!
//! Three closed rule kinds exist:
//! - **Selection** rules include or exclude a candidate outright.
//! - **Routing** rules bias the scoring without excluding anyone.
//! - **Cost** rules constrain per-request spend and are consumed by the
//!   cost controller.
//!
//! Precedence is scope specificity first (PerCredential > PerTeam >
//! PerProvider > Global), then the policy's explicit priority, then
//! definition order. For Selection and Cost rules the single most specific
//! applicable policy decides; Routing biases accumulate across every
//! applicable policy. Policies are immutable once active: changing the
//! active set publishes a whole new `PolicySet`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::credential::{Credential, CredentialId};
use crate::intent::RequestIntent;
use crate::provider::ProviderKey;

/// Closed kind of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Includes/excludes candidates.
    Selection,
    /// Biases candidate scoring.
    Routing,
    /// Constrains per-request cost.
    Cost,
}

/// Scope a policy applies to; the variant carries its scope key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyScope {
    /// Applies to every candidate.
    Global,
    /// Applies to candidates of one provider.
    Provider(ProviderKey),
    /// Applies when the intent carries this team scope key.
    Team(String),
    /// Applies to one credential.
    Credential(CredentialId),
}

impl PolicyScope {
    /// Specificity rank; higher wins during precedence resolution.
    #[must_use]
    pub const fn specificity(&self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Provider(_) => 1,
            Self::Team(_) => 2,
            Self::Credential(_) => 3,
        }
    }

    /// Whether this scope covers the given (intent, candidate) pair.
    #[must_use]
    pub fn matches(&self, intent: &RequestIntent, candidate: &Credential) -> bool {
        match self {
            Self::Global => true,
            Self::Provider(provider) => candidate.provider == *provider,
            Self::Team(team) => intent.team.as_deref() == Some(team.as_str()),
            Self::Credential(id) => candidate.id == *id,
        }
    }
}

/// Predicate that includes or excludes a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionRule {
    /// Candidate metadata at `key` must equal `value`.
    MetadataEquals {
        /// Metadata key to test.
        key: String,
        /// Required value.
        value: String,
    },
    /// Candidate metadata at `key` must be one of `values`.
    MetadataIn {
        /// Metadata key to test.
        key: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Candidate metadata at `key` must not be one of `values`.
    MetadataNotIn {
        /// Metadata key to test.
        key: String,
        /// Rejected values.
        values: Vec<String>,
    },
}

impl SelectionRule {
    /// Whether the candidate passes this predicate.
    #[must_use]
    pub fn permits(&self, candidate: &Credential) -> bool {
        match self {
            Self::MetadataEquals { key, value } => candidate.metadata_equals(key, value),
            Self::MetadataIn { key, values } => candidate
                .metadata
                .get(key)
                .is_some_and(|have| values.iter().any(|v| v == have)),
            Self::MetadataNotIn { key, values } => candidate
                .metadata
                .get(key)
                .is_none_or(|have| !values.iter().any(|v| v == have)),
        }
    }

    /// Short description used in deny diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::MetadataEquals { key, value } => format!("{key} == {value}"),
            Self::MetadataIn { key, values } => format!("{key} in {values:?}"),
            Self::MetadataNotIn { key, values } => format!("{key} not in {values:?}"),
        }
    }
}

/// Bias applied to candidate scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingRule {
    /// Add `weight` to the final score of candidates whose metadata at
    /// `key` equals `value`.
    PreferMetadata {
        /// Metadata key to test.
        key: String,
        /// Preferred value.
        value: String,
        /// Additive score bonus.
        weight: f64,
    },
    /// Strongly penalize candidates whose smoothed success rate is below
    /// `rate`. A bias, not an exclusion: a penalized candidate can still
    /// win when nothing healthier remains.
    MinSuccessRate {
        /// Success-rate floor in [0, 1].
        rate: f64,
    },
}

/// Constraint on per-request spend, consumed by the cost controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CostRule {
    /// Reject candidates whose estimated request cost exceeds `limit`.
    MaxCostPerRequest {
        /// Monetary ceiling per request.
        limit: Decimal,
    },
}

/// One rule of a policy; the variant fixes the rule's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicyRule {
    /// Selection predicate.
    Selection(SelectionRule),
    /// Scoring bias.
    Routing(RoutingRule),
    /// Cost constraint.
    Cost(CostRule),
}

impl PolicyRule {
    /// The kind this rule belongs to.
    #[must_use]
    pub const fn kind(&self) -> PolicyKind {
        match self {
            Self::Selection(_) => PolicyKind::Selection,
            Self::Routing(_) => PolicyKind::Routing,
            Self::Cost(_) => PolicyKind::Cost,
        }
    }
}

/// A named, scoped, ordered list of rules of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy id.
    pub id: String,
    /// Kind every rule in this policy must share.
    pub kind: PolicyKind,
    /// Scope the policy applies to.
    pub scope: PolicyScope,
    /// Ordered rules; order is the within-scope precedence.
    pub rules: Vec<PolicyRule>,
    /// Explicit priority among same-specificity policies; higher wins.
    pub priority: u32,
}

impl Policy {
    /// A selection policy.
    pub fn selection(
        id: impl Into<String>,
        scope: PolicyScope,
        rules: Vec<SelectionRule>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: PolicyKind::Selection,
            scope,
            rules: rules.into_iter().map(PolicyRule::Selection).collect(),
            priority: 0,
        }
    }

    /// A routing policy.
    pub fn routing(id: impl Into<String>, scope: PolicyScope, rules: Vec<RoutingRule>) -> Self {
        Self {
            id: id.into(),
            kind: PolicyKind::Routing,
            scope,
            rules: rules.into_iter().map(PolicyRule::Routing).collect(),
            priority: 0,
        }
    }

    /// A cost policy.
    pub fn cost(id: impl Into<String>, scope: PolicyScope, rules: Vec<CostRule>) -> Self {
        Self {
            id: id.into(),
            kind: PolicyKind::Cost,
            scope,
            rules: rules.into_iter().map(PolicyRule::Cost).collect(),
            priority: 0,
        }
    }

    /// Set the explicit priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether every rule matches the declared kind.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.rules.iter().all(|rule| rule.kind() == self.kind)
    }
}

/// Verdict of evaluating the active policy set against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// Whether selection rules permit the candidate.
    pub allowed: bool,
    /// Description of the rule that denied the candidate, if any.
    pub deny_rule: Option<String>,
    /// Accumulated additive score bias from routing rules.
    pub bias: f64,
    /// Success-rate floor from the most specific routing rule, if any.
    pub min_success_rate: Option<f64>,
    /// Per-request cost ceiling from the most specific cost rule, if any.
    pub max_cost_per_request: Option<Decimal>,
}

impl PolicyVerdict {
    /// Verdict when no policy applies.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            allowed: true,
            deny_rule: None,
            bias: 0.0,
            min_success_rate: None,
            max_cost_per_request: None,
        }
    }
}

/// The active, immutable set of policies, pre-sorted by precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Build a set from policies, sorting by precedence: specificity
    /// descending, explicit priority descending, definition order stable.
    #[must_use]
    pub fn new(mut policies: Vec<Policy>) -> Self {
        policies.sort_by(|a, b| {
            b.scope
                .specificity()
                .cmp(&a.scope.specificity())
                .then(b.priority.cmp(&a.priority))
        });
        Self { policies }
    }

    /// The policies in precedence order.
    #[must_use]
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Whether the set holds no policies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Evaluate the set against one (intent, candidate) pair.
    ///
    /// Selection: the most specific applicable selection policy decides
    /// alone, its rules ANDed. Routing: biases accumulate over every
    /// applicable policy; the success-rate floor comes from the most
    /// specific one. Cost: the most specific ceiling wins.
    #[must_use]
    pub fn evaluate(&self, intent: &RequestIntent, candidate: &Credential) -> PolicyVerdict {
        let mut verdict = PolicyVerdict::allow_all();
        let mut selection_decided = false;

        for policy in &self.policies {
            if !policy.scope.matches(intent, candidate) {
                continue;
            }
            match policy.kind {
                PolicyKind::Selection => {
                    if selection_decided {
                        continue;
                    }
                    selection_decided = true;
                    for rule in &policy.rules {
                        if let PolicyRule::Selection(selection) = rule
                            && !selection.permits(candidate)
                        {
                            verdict.allowed = false;
                            verdict.deny_rule =
                                Some(format!("{}: {}", policy.id, selection.describe()));
                            break;
                        }
                    }
                }
                PolicyKind::Routing => {
                    for rule in &policy.rules {
                        match rule {
                            PolicyRule::Routing(RoutingRule::PreferMetadata {
                                key,
                                value,
                                weight,
                            }) => {
                                if candidate.metadata_equals(key, value) {
                                    verdict.bias += weight;
                                }
                            }
                            PolicyRule::Routing(RoutingRule::MinSuccessRate { rate }) => {
                                if verdict.min_success_rate.is_none() {
                                    verdict.min_success_rate = Some(*rate);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                PolicyKind::Cost => {
                    for rule in &policy.rules {
                        if let PolicyRule::Cost(CostRule::MaxCostPerRequest { limit }) = rule
                            && verdict.max_cost_per_request.is_none()
                        {
                            verdict.max_cost_per_request = Some(*limit);
                        }
                    }
                }
            }
        }

        verdict
    }
}
