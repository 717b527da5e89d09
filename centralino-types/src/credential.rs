//! Credential records, key states, and the state-transition audit trail.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provider::ProviderKey;

/// Metadata key carrying a per-1k-token cost hint that overrides the
/// adapter's price table for estimation.
pub const META_COST_PER_1K: &str = "cost_per_1k";
/// Metadata key naming the commercial tier of a credential.
pub const META_TIER: &str = "tier";
/// Metadata key naming the region a credential is pinned to.
pub const META_REGION: &str = "region";
/// Metadata key naming the owning team.
pub const META_TEAM: &str = "team";

/// Stable identifier of a registered credential.
///
/// The id is the only credential-derived value that may appear in records,
/// events, errors, and responses; raw material never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Construct an id from a caller-chosen name.
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

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    /// Healthy and eligible for routing.
    Available,
    /// Temporarily cooling down after an upstream rate limit.
    Throttled,
    /// Out of capacity for the current window.
    Exhausted,
    /// Administratively disabled; never eligible again.
    Disabled,
    /// Rejected by the upstream or the vault; never eligible again.
    Invalid,
}

impl KeyState {
    /// Whether the transition table permits moving from `self` to `next`.
    ///
    /// Allowed moves: Available↔Throttled, Available↔Exhausted, any→Disabled,
    /// any→Invalid. Same-state "transitions" are handled as no-ops by the
    /// credential manager and never reach this check.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Throttled)
                | (Self::Throttled, Self::Available)
                | (Self::Available, Self::Exhausted)
                | (Self::Exhausted, Self::Available)
                | (_, Self::Disabled)
                | (_, Self::Invalid)
        )
    }

    /// Stable lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Throttled => "throttled",
            Self::Exhausted => "exhausted",
            Self::Disabled => "disabled",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason code attached to every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    /// Capacity for a window hit the Exhausted tier.
    Quota,
    /// A capacity window reset restored eligibility.
    WindowReset,
    /// The upstream rate-limited the credential.
    RateLimit,
    /// A throttle cooldown deadline elapsed.
    CooldownElapsed,
    /// The upstream rejected the credential's authentication.
    Auth,
    /// The vault could not open the sealed material.
    Crypto,
    /// Material was rotated by an operator.
    Rotation,
    /// The credential was revoked by an operator.
    Revoked,
    /// An operator transitioned the credential by hand.
    Manual,
}

impl TransitionReason {
    /// Stable lowercase reason code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::WindowReset => "window_reset",
            Self::RateLimit => "rate_limit",
            Self::CooldownElapsed => "cooldown_elapsed",
            Self::Auth => "auth",
            Self::Crypto => "crypto",
            Self::Rotation => "rotation",
            Self::Revoked => "revoked",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sealed (encrypted) credential material as produced by the vault.
///
/// The bytes are opaque ciphertext including nonce and authentication tag.
/// `Debug` deliberately hides the contents.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMaterial(Vec<u8>);

impl SealedMaterial {
    /// Wrap ciphertext bytes produced by the vault.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The opaque ciphertext bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ciphertext length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the ciphertext is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SealedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedMaterial(<{} bytes>)", self.0.len())
    }
}

/// A registered credential for one upstream provider.
///
/// Records are immutable snapshots: mutation replaces the whole record
/// atomically, so readers never observe a partially updated credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Stable identifier.
    pub id: CredentialId,
    /// Provider this credential authenticates against.
    pub provider: ProviderKey,
    /// Sealed material; only ever opened transiently for dispatch.
    pub material: SealedMaterial,
    /// Current lifecycle state.
    pub state: KeyState,
    /// Successful dispatches observed.
    pub successes: u64,
    /// Failed dispatches observed (timeouts excluded).
    pub failures: u64,
    /// Instant of the most recent dispatch outcome.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Instant of the most recent failure, for recent-failure penalties.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Deadline before which a Throttled credential stays ineligible.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Opaque operator metadata (tier, region, cost hints, team, ...).
    pub metadata: BTreeMap<String, String>,
    /// Registration instant.
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Smoothed success rate in [0, 1): `successes / (successes + failures + 1)`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let s = self.successes as f64;
        let f = self.failures as f64;
        s / (s + f + 1.0)
    }

    /// Observed dispatch outcomes, used as the fairness usage count.
    #[must_use]
    pub const fn usage_count(&self) -> u64 {
        self.successes + self.failures
    }

    /// Per-1k-token cost hint from metadata, if present and parseable.
    #[must_use]
    pub fn cost_hint(&self) -> Option<Decimal> {
        self.metadata
            .get(META_COST_PER_1K)
            .and_then(|raw| raw.parse::<Decimal>().ok())
    }

    /// Whether a metadata entry equals `value`.
    #[must_use]
    pub fn metadata_equals(&self, key: &str, value: &str) -> bool {
        self.metadata.get(key).is_some_and(|have| have == value)
    }
}

/// Audit record written on every credential state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Record id.
    pub id: Uuid,
    /// Instant the transition was applied.
    pub at: DateTime<Utc>,
    /// Credential that changed state.
    pub credential_id: CredentialId,
    /// State before the change.
    pub from: KeyState,
    /// State after the change.
    pub to: KeyState,
    /// Closed reason code.
    pub reason: TransitionReason,
    /// Free-text operator context (cooldown deadlines, error summaries).
    pub context: String,
}
