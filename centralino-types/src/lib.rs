//! centralino-types
//!
//! Shared data-transfer objects for the centralino credential router.
//!
//! - `credential`: credential records, key states, and transition records.
//! - `capacity`: time windows, capacity tiers, and capacity snapshots.
//! - `budget`: monetary budgets, cost estimates, and budget decisions.
//! - `policy`: scoped routing/selection/cost policies with precedence.
//! - `intent`: request intents, chat messages, and route receipts.
//! - `decision`: routing objectives, scores, and decision records.
//! - `events`: structured events emitted through the observability sink.
//! - `config`: router configuration (thresholds, retries, timeouts).
//! - `filter`: query filters for decision/transition/audit lookups.
#![warn(missing_docs)]

pub mod budget;
pub mod capacity;
pub mod config;
pub mod credential;
pub mod decision;
pub mod events;
pub mod filter;
pub mod intent;
pub mod policy;
pub mod provider;

pub use budget::{Budget, BudgetDecision, BudgetId, BudgetScope, CostEstimate, EnforcementMode, EstimateSource};
pub use capacity::{CapacitySnapshot, CapacityTier, ExhaustionForecast, TierThresholds, TimeWindow};
pub use config::{BackoffConfig, RetryConfig, RouterConfig};
pub use credential::{
    Credential, CredentialId, KeyState, SealedMaterial, StateTransition, TransitionReason,
};
pub use decision::{
    CandidateScore, EligibilityBreakdown, Objective, ObjectiveKind, ObjectiveWeight, RoutingDecision,
};
pub use events::{EventEnvelope, RouterEvent};
pub use filter::{QueryFilter, RecordKind};
pub use intent::{ChatMessage, RequestIntent, Role, RouteReceipt, TokenUsage};
pub use policy::{
    CostRule, Policy, PolicyKind, PolicyRule, PolicyScope, PolicySet, PolicyVerdict, RoutingRule,
    SelectionRule,
};
pub use provider::ProviderKey;
