//! Monetary budgets, cost estimates, and budget check outcomes.
//!
//! All monetary values are `rust_decimal::Decimal`; accumulation never goes
//! through binary floating point.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capacity::TimeWindow;
use crate::credential::{Credential, CredentialId};
use crate::intent::RequestIntent;
use crate::provider::ProviderKey;

/// Identifier of a configured budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetId(String);

impl BudgetId {
    /// Construct a budget id from a caller-chosen name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the inner id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BudgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope a budget applies to; the variant carries its scope key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetScope {
    /// All traffic through the router.
    Global,
    /// Traffic dispatched to one provider.
    Provider(ProviderKey),
    /// Traffic dispatched through one credential.
    Credential(CredentialId),
    /// Traffic attributed to one team via the intent's scope key.
    Team(String),
}

impl BudgetScope {
    /// Whether this scope covers the given (intent, credential) pair.
    #[must_use]
    pub fn applies_to(&self, intent: &RequestIntent, credential: &Credential) -> bool {
        match self {
            Self::Global => true,
            Self::Provider(provider) => credential.provider == *provider,
            Self::Credential(id) => credential.id == *id,
            Self::Team(team) => intent.team.as_deref() == Some(team.as_str()),
        }
    }
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Provider(p) => write!(f, "provider:{p}"),
            Self::Credential(c) => write!(f, "credential:{c}"),
            Self::Team(t) => write!(f, "team:{t}"),
        }
    }
}

/// How a budget reacts when a request would push spend past the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnforcementMode {
    /// Block the request.
    Hard,
    /// Allow the request and flag the breach.
    Soft,
}

/// A monetary budget over one scope and window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Budget id.
    pub id: BudgetId,
    /// Scope the budget covers.
    pub scope: BudgetScope,
    /// Monetary limit per window.
    pub limit: Decimal,
    /// Accounting window.
    pub window: TimeWindow,
    /// Hard budgets block; soft budgets flag.
    pub enforcement: EnforcementMode,
    /// Spend accumulated within the current window (reservations included).
    pub spent: Decimal,
    /// Instant the current window started.
    pub window_started_at: DateTime<Utc>,
}

impl Budget {
    /// Remaining headroom, floored at zero.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        (self.limit - self.spent).max(Decimal::ZERO)
    }

    /// Whether adding `amount` would push spend past the limit.
    #[must_use]
    pub fn would_exceed(&self, amount: Decimal) -> bool {
        self.spent + amount > self.limit
    }

    /// Whether the window has rolled past its reset boundary at `now`.
    #[must_use]
    pub fn rollover_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.window.next_reset(self.window_started_at)
    }

    /// Fraction of the limit consumed, for gauges. Zero-limit budgets
    /// report full utilization.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.limit <= Decimal::ZERO {
            return 1.0;
        }
        use rust_decimal::prelude::ToPrimitive;
        (self.spent / self.limit).to_f64().unwrap_or(1.0)
    }
}

/// Which source produced a cost estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateSource {
    /// The provider adapter's price table (possibly calibrated).
    Adapter,
    /// A `cost_per_1k` metadata hint on the credential.
    Metadata,
}

/// Estimated cost of dispatching one intent through one credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Final estimated amount after hints and calibration.
    pub amount: Decimal,
    /// Uncalibrated adapter figure, kept for calibration feedback.
    pub adapter_amount: Decimal,
    /// Estimated input tokens.
    pub input_tokens: u64,
    /// Estimated output tokens.
    pub output_tokens: u64,
    /// Which source won the estimate.
    pub source: EstimateSource,
}

/// Outcome of checking an estimate against every applicable budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDecision {
    /// Whether every hard budget permits the request.
    pub allowed: bool,
    /// Tightest remaining headroom across applicable budgets.
    pub remaining: Option<Decimal>,
    /// Hard budget that blocked the request, if any.
    pub blocking: Option<BudgetId>,
    /// Soft budgets the request would breach.
    pub breached: Vec<BudgetId>,
}

impl BudgetDecision {
    /// A decision with no applicable budgets: everything is allowed.
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self {
            allowed: true,
            remaining: None,
            blocking: None,
            breached: Vec::new(),
        }
    }
}
