//! Structured events delivered to the observability sink.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::budget::BudgetId;
use crate::capacity::TimeWindow;
use crate::credential::{CredentialId, KeyState, TransitionReason};
use crate::provider::ProviderKey;

/// A structured router event.
///
/// Events carry credential ids only, never material (I1); anything secret
/// stays out of this surface by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterEvent {
    /// A credential was registered.
    CredentialRegistered {
        /// New credential.
        credential_id: CredentialId,
        /// Its provider.
        provider: ProviderKey,
    },
    /// A credential's material was rotated.
    CredentialRotated {
        /// Rotated credential.
        credential_id: CredentialId,
    },
    /// A credential was revoked.
    CredentialRevoked {
        /// Revoked credential.
        credential_id: CredentialId,
    },
    /// A credential changed state.
    CredentialTransitioned {
        /// Credential that changed state.
        credential_id: CredentialId,
        /// Previous state.
        from: KeyState,
        /// New state.
        to: KeyState,
        /// Reason code.
        reason: TransitionReason,
    },
    /// A capacity window reset.
    QuotaReset {
        /// Credential whose window reset.
        credential_id: CredentialId,
        /// The window.
        window: TimeWindow,
    },
    /// A capacity window hit the Exhausted tier.
    QuotaExhausted {
        /// Credential that exhausted.
        credential_id: CredentialId,
        /// The window.
        window: TimeWindow,
    },
    /// Spend pushed past a budget limit.
    BudgetBreached {
        /// Breached budget.
        budget_id: BudgetId,
        /// Spend after the breach.
        spent: Decimal,
        /// The limit.
        limit: Decimal,
    },
    /// A routing decision was persisted.
    DecisionRecorded {
        /// Decision record id.
        decision_id: Uuid,
        /// Chosen credential.
        credential_id: CredentialId,
    },
    /// A route call started.
    RequestStarted {
        /// Target provider.
        provider: ProviderKey,
        /// Target model.
        model: String,
    },
    /// A route call completed successfully.
    RequestSucceeded {
        /// Credential that served the request.
        credential_id: CredentialId,
        /// Reconciled cost.
        cost: Decimal,
        /// Wall time in milliseconds.
        elapsed_ms: u64,
    },
    /// A route call failed terminally.
    RequestFailed {
        /// Last credential attempted, if any was selected.
        credential_id: Option<CredentialId>,
        /// Error kind label.
        kind: String,
    },
    /// The vault started without a configured key; sealed material will
    /// not survive a restart.
    VaultKeyEphemeral,
}

impl RouterEvent {
    /// Stable snake_case event name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CredentialRegistered { .. } => "credential_registered",
            Self::CredentialRotated { .. } => "credential_rotated",
            Self::CredentialRevoked { .. } => "credential_revoked",
            Self::CredentialTransitioned { .. } => "credential_transitioned",
            Self::QuotaReset { .. } => "quota_reset",
            Self::QuotaExhausted { .. } => "quota_exhausted",
            Self::BudgetBreached { .. } => "budget_breached",
            Self::DecisionRecorded { .. } => "decision_recorded",
            Self::RequestStarted { .. } => "request_started",
            Self::RequestSucceeded { .. } => "request_succeeded",
            Self::RequestFailed { .. } => "request_failed",
            Self::VaultKeyEphemeral => "vault_key_ephemeral",
        }
    }
}

/// Envelope stamping each event with its instant and correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Instant the event was emitted.
    pub at: DateTime<Utc>,
    /// Correlation id propagated from the intent, when the event belongs
    /// to one request.
    pub correlation_id: Option<String>,
    /// The event payload.
    pub event: RouterEvent,
}

impl EventEnvelope {
    /// Wrap an event without request correlation.
    #[must_use]
    pub fn new(event: RouterEvent) -> Self {
        Self {
            at: Utc::now(),
            correlation_id: None,
            event,
        }
    }

    /// Wrap an event correlated to one request.
    #[must_use]
    pub fn correlated(event: RouterEvent, correlation_id: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            correlation_id: Some(correlation_id.into()),
            event,
        }
    }
}
