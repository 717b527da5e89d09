//! Capacity accounting per (credential, window).
//!
//! Snapshots are replaced atomically and are monotonic within a window:
//! `consumed` only grows until a reset crosses the window boundary. Resets
//! are lazy; the next observe/snapshot/eligibility touch at or past
//! `reset_at` performs them inline, so the engine owns no timers.
//! Updates for one (credential, window) pair are serialized behind a
//! per-entity mutex; pairs are independent of each other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use centralino_core::{CentralinoError, EventSink, StateStore};
use centralino_types::{
    CapacitySnapshot, CapacityTier, CredentialId, EventEnvelope, ExhaustionForecast, RouterEvent,
    TierThresholds, TimeWindow,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

type QuotaKey = (CredentialId, TimeWindow);

const SAMPLE_CAP: usize = 64;

/// What one `observe` call did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOutcome {
    /// Tier after the observation.
    pub tier: CapacityTier,
    /// Whether a lazy window reset ran before the units were added.
    pub was_reset: bool,
    /// Whether this observation pushed the tier into Exhausted.
    pub became_exhausted: bool,
}

pub(crate) struct QuotaEngine {
    published: RwLock<HashMap<QuotaKey, Arc<CapacitySnapshot>>>,
    samples: Mutex<HashMap<QuotaKey, VecDeque<(DateTime<Utc>, u64)>>>,
    locks: Mutex<HashMap<QuotaKey, Arc<tokio::sync::Mutex<()>>>>,
    thresholds: TierThresholds,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EventSink>,
}

impl QuotaEngine {
    pub(crate) fn new(
        thresholds: TierThresholds,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            published: RwLock::new(HashMap::new()),
            samples: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            thresholds,
            store,
            sink,
        }
    }

    fn entity_lock(&self, key: &QuotaKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    fn published_get(&self, key: &QuotaKey) -> Option<Arc<CapacitySnapshot>> {
        self.published
            .read()
            .ok()
            .and_then(|published| published.get(key).cloned())
    }

    async fn persist_and_publish(
        &self,
        key: QuotaKey,
        snapshot: CapacitySnapshot,
    ) -> Result<Arc<CapacitySnapshot>, CentralinoError> {
        self.store.save_snapshot(&snapshot).await?;
        let snapshot = Arc::new(snapshot);
        if let Ok(mut published) = self.published.write() {
            published.insert(key, Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    fn push_sample(&self, key: &QuotaKey, at: DateTime<Utc>, consumed: u64) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let series = samples.entry(key.clone()).or_default();
        series.push_back((at, consumed));
        while series.len() > SAMPLE_CAP {
            series.pop_front();
        }
    }

    fn clear_samples(&self, key: &QuotaKey) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.remove(key);
    }

    fn fresh(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        total: Option<u64>,
        now: DateTime<Utc>,
    ) -> CapacitySnapshot {
        CapacitySnapshot {
            credential_id: id.clone(),
            window,
            total,
            consumed: 0,
            tier: self.thresholds.classify(0, total),
            reset_at: window.next_reset(now),
            updated_at: now,
        }
    }

    /// Configure (or reconfigure) the capacity total for a window. The
    /// consumed count of an existing snapshot is retained; only the total
    /// and tier change.
    pub(crate) async fn configure(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        total: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<CapacitySnapshot, CentralinoError> {
        let key = (id.clone(), window);
        let entity = self.entity_lock(&key);
        let _guard = entity.lock().await;

        let snapshot = match self.published_get(&key) {
            Some(current) => {
                let mut next = CapacitySnapshot::clone(&current);
                next.total = total;
                next.tier = self.thresholds.classify(next.consumed, total);
                next.updated_at = now;
                next
            }
            None => self.fresh(id, window, total, now),
        };
        let published = self.persist_and_publish(key, snapshot).await?;
        Ok(CapacitySnapshot::clone(&published))
    }

    /// Record consumed units against a window, running a lazy reset first
    /// when `ts` has crossed the snapshot's boundary.
    pub(crate) async fn observe(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        units: u64,
        ts: DateTime<Utc>,
    ) -> Result<ObserveOutcome, CentralinoError> {
        let key = (id.clone(), window);
        let entity = self.entity_lock(&key);
        let _guard = entity.lock().await;

        let mut snapshot = match self.published_get(&key) {
            Some(current) => CapacitySnapshot::clone(&current),
            None => self.fresh(id, window, None, ts),
        };

        let mut was_reset = false;
        if ts >= snapshot.reset_at {
            snapshot.consumed = 0;
            snapshot.reset_at = window.next_reset(ts);
            self.clear_samples(&key);
            was_reset = true;
            self.sink.emit(&EventEnvelope::new(RouterEvent::QuotaReset {
                credential_id: id.clone(),
                window,
            }));
        }

        let previous_tier = if was_reset {
            self.thresholds.classify(0, snapshot.total)
        } else {
            snapshot.tier
        };
        snapshot.consumed = snapshot.consumed.saturating_add(units);
        snapshot.tier = self.thresholds.classify(snapshot.consumed, snapshot.total);
        snapshot.updated_at = ts;

        let became_exhausted =
            snapshot.tier == CapacityTier::Exhausted && previous_tier != CapacityTier::Exhausted;
        if became_exhausted {
            self.sink.emit(&EventEnvelope::new(RouterEvent::QuotaExhausted {
                credential_id: id.clone(),
                window,
            }));
        }

        let tier = snapshot.tier;
        let consumed = snapshot.consumed;
        self.persist_and_publish(key.clone(), snapshot).await?;
        self.push_sample(&key, ts, consumed);

        Ok(ObserveOutcome {
            tier,
            was_reset,
            became_exhausted,
        })
    }

    /// Run a lazy reset on one window if its boundary has passed; returns
    /// whether a reset happened.
    async fn touch(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<bool, CentralinoError> {
        let key = (id.clone(), window);
        let entity = self.entity_lock(&key);
        let _guard = entity.lock().await;

        let Some(current) = self.published_get(&key) else {
            return Ok(false);
        };
        if now < current.reset_at {
            return Ok(false);
        }
        let mut next = CapacitySnapshot::clone(&current);
        next.consumed = 0;
        next.tier = self.thresholds.classify(0, next.total);
        next.reset_at = window.next_reset(now);
        next.updated_at = now;
        self.clear_samples(&key);
        self.persist_and_publish(key, next).await?;
        self.sink.emit(&EventEnvelope::new(RouterEvent::QuotaReset {
            credential_id: id.clone(),
            window,
        }));
        Ok(true)
    }

    /// Windows with a snapshot for one credential.
    pub(crate) fn windows_for(&self, id: &CredentialId) -> Vec<TimeWindow> {
        self.published
            .read()
            .map(|published| {
                published
                    .keys()
                    .filter(|(cred, _)| cred == id)
                    .map(|(_, window)| *window)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Worst tier across a credential's windows at `now`, applying lazy
    /// resets first. Also reports whether any window reset, so the caller
    /// can drive the Exhausted→Available transition.
    pub(crate) async fn refresh(
        &self,
        id: &CredentialId,
        now: DateTime<Utc>,
    ) -> Result<(CapacityTier, bool), CentralinoError> {
        let mut worst = CapacityTier::Abundant;
        let mut any_reset = false;
        for window in self.windows_for(id) {
            if self.touch(id, window, now).await? {
                any_reset = true;
            }
            if let Some(snapshot) = self.published_get(&(id.clone(), window)) {
                worst = worst.max(snapshot.tier);
            }
        }
        Ok((worst, any_reset))
    }

    /// Current snapshot for one window, after a lazy reset check.
    pub(crate) async fn snapshot(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<CapacitySnapshot>, CentralinoError> {
        self.touch(id, window, now).await?;
        Ok(self
            .published_get(&(id.clone(), window))
            .map(|snapshot| CapacitySnapshot::clone(&snapshot)))
    }

    /// Force a window back to zero consumed, regardless of its boundary.
    /// Normal resets happen lazily; this is the operator override.
    pub(crate) async fn reset(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<(), CentralinoError> {
        let key = (id.clone(), window);
        let entity = self.entity_lock(&key);
        let _guard = entity.lock().await;

        let Some(current) = self.published_get(&key) else {
            return Err(CentralinoError::not_found(format!(
                "capacity snapshot for {id} ({window})"
            )));
        };
        let mut next = CapacitySnapshot::clone(&current);
        next.consumed = 0;
        next.tier = self.thresholds.classify(0, next.total);
        next.reset_at = window.next_reset(now);
        next.updated_at = now;
        self.clear_samples(&key);
        self.persist_and_publish(key, next).await?;
        self.sink.emit(&EventEnvelope::new(RouterEvent::QuotaReset {
            credential_id: id.clone(),
            window,
        }));
        Ok(())
    }

    /// Advisory linear projection of when a window exhausts, from the
    /// recent consumption rate. Never feeds back into eligibility.
    pub(crate) fn predict_exhaustion(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> ExhaustionForecast {
        let key = (id.clone(), window);
        let Some(snapshot) = self.published_get(&key) else {
            return ExhaustionForecast::Never;
        };
        let Some(total) = snapshot.total else {
            return ExhaustionForecast::Never;
        };
        if snapshot.consumed >= total {
            return ExhaustionForecast::At(now);
        }

        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        let Some(series) = samples.get(&key) else {
            return ExhaustionForecast::Never;
        };
        let (Some(first), Some(last)) = (series.front(), series.back()) else {
            return ExhaustionForecast::Never;
        };
        let elapsed = (last.0 - first.0).num_milliseconds();
        if elapsed <= 0 || last.1 <= first.1 {
            return ExhaustionForecast::Never;
        }
        let rate_per_ms = (last.1 - first.1) as f64 / elapsed as f64;
        let remaining = (total - snapshot.consumed) as f64;
        let eta_ms = (remaining / rate_per_ms).ceil() as i64;
        ExhaustionForecast::At(now + ChronoDuration::milliseconds(eta_ms))
    }
}
