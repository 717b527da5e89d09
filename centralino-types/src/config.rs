//! Router configuration shared between the façade and its engines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capacity::TierThresholds;
use crate::decision::Objective;

/// Exponential backoff configuration for same-credential retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 100,
            max_backoff_ms: 5_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Retry bounds for one `route` call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total dispatch attempts per route call, the first included.
    pub max_attempts: u32,
    /// Backoff between same-credential retries.
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Global configuration for the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Boundaries between capacity tiers.
    pub tier_thresholds: TierThresholds,
    /// Per-route retry bounds and backoff.
    pub retry: RetryConfig,
    /// Objective used when the intent carries no override.
    pub default_objective: Objective,
    /// Timeout for one adapter dispatch.
    pub provider_timeout: Duration,
    /// Optional overall deadline for a whole route call, retries included.
    pub request_timeout: Option<Duration>,
    /// Cooldown applied to a Throttled credential when the upstream gives
    /// no retry hint.
    pub default_cooldown: Duration,
    /// How long a failure keeps depressing the reliability score.
    pub failure_penalty_window: Duration,
    /// Half-life of the fairness idle-decay.
    pub fairness_half_life: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tier_thresholds: TierThresholds::default(),
            retry: RetryConfig::default(),
            default_objective: Objective::reliability(),
            provider_timeout: Duration::from_secs(30),
            request_timeout: None,
            default_cooldown: Duration::from_secs(60),
            failure_penalty_window: Duration::from_secs(300),
            fairness_half_life: Duration::from_secs(3600),
        }
    }
}
