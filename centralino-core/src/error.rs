use centralino_types::{EligibilityBreakdown, KeyState};
use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the centralino workspace.
///
/// Variants mirror the routing error taxonomy: validation and lookup
/// failures surface immediately; transient/throttled/quota/auth failures
/// are handled inside the route loop; internal and crypto failures abort
/// before dispatch. Messages are redacted by construction: they carry
/// credential ids, never material or raw upstream payloads.
#[derive(Debug, Error)]
pub enum CentralinoError {
    /// Malformed intent or configuration input.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The intent names a provider with no registered adapter.
    #[error("unknown provider: {provider}")]
    UnknownProvider {
        /// Provider name from the intent.
        provider: String,
    },

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "credential k1".
        what: String,
    },

    /// Credential registration was rejected.
    #[error("registration rejected: {0}")]
    Registration(String),

    /// The requested state change violates the transition table.
    #[error("invalid transition for {credential}: {from} -> {to}")]
    InvalidTransition {
        /// Credential the transition targeted.
        credential: String,
        /// Current state.
        from: KeyState,
        /// Rejected target state.
        to: KeyState,
    },

    /// Every candidate was filtered out before scoring.
    #[error("no eligible candidates ({breakdown})")]
    NoEligibleCandidates {
        /// Why each considered credential was rejected.
        breakdown: EligibilityBreakdown,
    },

    /// A hard budget would be exceeded.
    #[error("budget exceeded: {budget} (remaining {remaining})")]
    BudgetExceeded {
        /// Blocking budget id.
        budget: String,
        /// Headroom left in that budget.
        remaining: Decimal,
    },

    /// The upstream rate-limited the credential in use.
    #[error("throttled upstream: retry in {cooldown_ms}ms")]
    Throttled {
        /// Cooldown hint in milliseconds.
        cooldown_ms: u64,
    },

    /// The upstream reported the credential's quota as exhausted.
    #[error("quota exceeded upstream: {msg}")]
    QuotaExceeded {
        /// Redacted upstream summary.
        msg: String,
    },

    /// The upstream rejected the credential's authentication.
    #[error("authentication failed: {msg}")]
    AuthFailure {
        /// Redacted upstream summary.
        msg: String,
    },

    /// Transient network or upstream failure; retryable on the same
    /// credential.
    #[error("transient upstream failure: {msg}")]
    Transient {
        /// Redacted upstream summary.
        msg: String,
    },

    /// Non-retryable upstream rejection.
    #[error("permanent upstream failure: {msg}")]
    Permanent {
        /// Redacted upstream summary.
        msg: String,
    },

    /// A deadline elapsed; the credential is not penalized.
    #[error("timed out: {what}")]
    Timeout {
        /// What timed out ("provider call", "route").
        what: &'static str,
    },

    /// Vault sealing or opening failed (tamper or key mismatch).
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// State-store or other internal failure; dispatch does not proceed.
    #[error("internal error: {0}")]
    Internal(String),

    /// Every attempted candidate failed; contains the individual failures.
    #[error("all candidates failed: {0:?}")]
    AllCandidatesFailed(Vec<CentralinoError>),
}

impl CentralinoError {
    /// Helper: build a `Validation` error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Helper: build a `NotFound` error for a description of the missing
    /// resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build an `UnknownProvider` error.
    pub fn unknown_provider(provider: impl Into<String>) -> Self {
        Self::UnknownProvider {
            provider: provider.into(),
        }
    }

    /// Helper: build a `Transient` error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient { msg: msg.into() }
    }

    /// Helper: build an `Internal` error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Helper: build a `Timeout` error.
    #[must_use]
    pub const fn timeout(what: &'static str) -> Self {
        Self::Timeout { what }
    }

    /// Stable snake_case label of the error kind, used in events, metrics,
    /// and retry-reason counters.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::NotFound { .. } => "not_found",
            Self::Registration(_) => "registration",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NoEligibleCandidates { .. } => "no_eligible_candidates",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::Throttled { .. } => "throttled",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::AuthFailure { .. } => "auth_failure",
            Self::Transient { .. } => "transient",
            Self::Permanent { .. } => "permanent",
            Self::Timeout { .. } => "timeout",
            Self::Crypto(_) => "crypto",
            Self::Internal(_) => "internal",
            Self::AllCandidatesFailed(_) => "all_candidates_failed",
        }
    }
}
