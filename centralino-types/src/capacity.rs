//! Capacity windows, tiers, and per-credential capacity snapshots.

use chrono::{DateTime, Datelike, Duration, DurationRound, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::CredentialId;

/// Accounting window for capacity and budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    /// Resets at the top of every hour (UTC).
    Hourly,
    /// Resets at midnight UTC.
    Daily,
    /// Resets on the first of the month (UTC).
    Monthly,
}

impl TimeWindow {
    /// Stable lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }

    /// The next reset boundary strictly after `from`.
    ///
    /// Boundaries are calendar-aligned in UTC: top of hour, midnight, or
    /// first of the month.
    #[must_use]
    pub fn next_reset(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Hourly => {
                let start = from.duration_trunc(Duration::hours(1)).unwrap_or(from);
                start + Duration::hours(1)
            }
            Self::Daily => {
                let start = from.duration_trunc(Duration::days(1)).unwrap_or(from);
                start + Duration::days(1)
            }
            Self::Monthly => {
                let start = from
                    .date_naive()
                    .with_day(1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|n| n.and_utc())
                    .unwrap_or(from);
                start + Months::new(1)
            }
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse bucket of remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapacityTier {
    /// At least half of the window's capacity remains.
    Abundant,
    /// Less than half remains.
    Constrained,
    /// Less than the critical fraction remains.
    Critical,
    /// Nothing remains; the credential is ineligible until reset.
    Exhausted,
}

impl CapacityTier {
    /// Stable lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abundant => "abundant",
            Self::Constrained => "constrained",
            Self::Critical => "critical",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Configurable boundaries between capacity tiers, expressed as fractions
/// of remaining capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Remaining fraction below which the tier is Constrained.
    pub constrained_below: f64,
    /// Remaining fraction below which the tier is Critical.
    pub critical_below: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            constrained_below: 0.50,
            critical_below: 0.15,
        }
    }
}

impl TierThresholds {
    /// Classify consumed units against an optional total capacity.
    ///
    /// A credential without a configured total never leaves Abundant; the
    /// quota engine has nothing to exhaust it against.
    #[must_use]
    pub fn classify(&self, consumed: u64, total: Option<u64>) -> CapacityTier {
        let Some(total) = total else {
            return CapacityTier::Abundant;
        };
        if total == 0 || consumed >= total {
            return CapacityTier::Exhausted;
        }
        let remaining = (total - consumed) as f64 / total as f64;
        if remaining < self.critical_below {
            CapacityTier::Critical
        } else if remaining < self.constrained_below {
            CapacityTier::Constrained
        } else {
            CapacityTier::Abundant
        }
    }
}

/// Point-in-time capacity accounting for one (credential, window) pair.
///
/// Snapshots are replaced atomically; `consumed` is monotonic within a
/// window and only returns to zero when a reset crosses `reset_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    /// Credential being accounted.
    pub credential_id: CredentialId,
    /// Window this snapshot accounts for.
    pub window: TimeWindow,
    /// Configured capacity, if any.
    pub total: Option<u64>,
    /// Units consumed within the current window.
    pub consumed: u64,
    /// Current tier derived from `consumed` and `total`.
    pub tier: CapacityTier,
    /// Instant at which the current window rolls over.
    pub reset_at: DateTime<Utc>,
    /// Instant of the last update.
    pub updated_at: DateTime<Utc>,
}

impl CapacitySnapshot {
    /// Units remaining, if a total is configured.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.total.map(|t| t.saturating_sub(self.consumed))
    }
}

/// Advisory forecast of when a credential will exhaust a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionForecast {
    /// Consumption trend never reaches the configured total.
    Never,
    /// Projected exhaustion instant from the recent consumption rate.
    At(DateTime<Utc>),
}
