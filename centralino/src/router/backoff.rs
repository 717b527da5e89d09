//! Exponential backoff with jitter for same-credential retries.

use std::time::Duration;

use centralino_types::BackoffConfig;
use rand::Rng;

/// Explicit backoff state machine; one instance lives per `route` call so
/// the retry budget and delay growth are auditable per request.
#[derive(Debug)]
pub(crate) struct Backoff {
    cfg: BackoffConfig,
    current_ms: u64,
}

impl Backoff {
    pub(crate) const fn new(cfg: BackoffConfig) -> Self {
        Self {
            current_ms: cfg.min_backoff_ms,
            cfg,
        }
    }

    /// The next delay: the current base plus jitter, growing the base by
    /// the configured factor up to the cap.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let base = self.current_ms;
        self.current_ms = base
            .saturating_mul(u64::from(self.cfg.factor.max(1)))
            .min(self.cfg.max_backoff_ms);
        Duration::from_millis(jitter_wait(base, u32::from(self.cfg.jitter_percent)))
    }
}

/// Add up to `jitter_percent` percent of random jitter to a base delay.
fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}
