//! # centralino
//!
//! An embeddable routing core that spreads LLM API traffic across a pool
//! of provider credentials. Each request hands the router an intent; the
//! router selects a credential under an objective (cost, reliability,
//! fairness, speed, or a weighted composite), enforces budgets, quotas,
//! and declarative policies, dispatches through the matching provider
//! adapter, records the decision and every state transition, and returns
//! a receipt.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use centralino::{Centralino, ChatMessage, Objective, RequestIntent};
//!
//! let router = Centralino::builder()
//!     .with_adapter(Arc::new(my_provider_adapter))
//!     .build()?;
//!
//! router.register_credential_named("k1", b"sk-...", "my-provider", Default::default()).await?;
//!
//! let intent = RequestIntent::new("my-provider", "some-model")
//!     .message(ChatMessage::user("hi"))
//!     .objective(Objective::cost());
//! let receipt = router.route(&intent).await?;
//! println!("served by {} for {}", receipt.credential_id, receipt.cost);
//! ```
//!
//! Raw credential material is sealed by an AES-256-GCM vault at
//! registration and opened only transiently for dispatch; it never appears
//! in records, events, errors, or receipts.
#![warn(missing_docs)]

mod admin;
mod core;
mod cost;
mod manager;
mod metrics;
mod quota;
mod router;

pub use crate::core::{Centralino, CentralinoBuilder};
pub use crate::quota::ObserveOutcome;

pub use centralino_core::{
    AdapterResponse, CentralinoError, ErrorDisposition, EventSink, MemoryStore, NullSink,
    OpenedMaterial, ProviderAdapter, StateStore, StoreRecord, VAULT_KEY_ENV, Vault,
};
pub use centralino_types::{
    Budget, BudgetDecision, BudgetId, BudgetScope, CapacitySnapshot, CapacityTier, ChatMessage,
    CostEstimate, CostRule, Credential, CredentialId, EligibilityBreakdown, EnforcementMode,
    EstimateSource, EventEnvelope, ExhaustionForecast, KeyState, Objective, ObjectiveKind,
    ObjectiveWeight, Policy, PolicyKind, PolicyRule, PolicyScope, PolicySet, PolicyVerdict,
    ProviderKey, QueryFilter, RecordKind, RequestIntent, RetryConfig, Role, RouteReceipt,
    RouterConfig, RouterEvent, RoutingDecision, RoutingRule, SelectionRule, StateTransition,
    TierThresholds, TimeWindow, TokenUsage, TransitionReason,
};
