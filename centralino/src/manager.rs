//! Credential lifecycle: registration, transitions, rotation, revocation,
//! and eligibility polling.
//!
//! Records are immutable snapshots behind `Arc`s: writers rebuild the
//! record, persist it, then publish the new snapshot under a short-held
//! lock. Readers clone the `Arc` and never block each other. Per-credential
//! async mutexes serialize writers on the same entity; writers on different
//! credentials proceed independently. A transition record is persisted
//! *before* the new state is published, so no eligibility query can
//! observe a state the audit trail does not yet explain.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use centralino_core::{CentralinoError, EventSink, OpenedMaterial, StateStore, Vault};
use centralino_types::{
    Credential, CredentialId, EventEnvelope, KeyState, ProviderKey, RouterEvent, StateTransition,
    TransitionReason,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub(crate) struct CredentialManager {
    records: RwLock<HashMap<CredentialId, Arc<Credential>>>,
    locks: Mutex<HashMap<CredentialId, Arc<tokio::sync::Mutex<()>>>>,
    vault: Arc<Vault>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EventSink>,
}

impl CredentialManager {
    pub(crate) fn new(
        vault: Arc<Vault>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            vault,
            store,
            sink,
        }
    }

    fn entity_lock(&self, id: &CredentialId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    fn publish(&self, credential: Arc<Credential>) {
        if let Ok(mut records) = self.records.write() {
            records.insert(credential.id.clone(), credential);
        }
    }

    /// Seal and register new credential material.
    pub(crate) async fn register(
        &self,
        id: Option<CredentialId>,
        material: &[u8],
        provider: ProviderKey,
        metadata: BTreeMap<String, String>,
    ) -> Result<Credential, CentralinoError> {
        if material.is_empty() {
            return Err(CentralinoError::Registration(
                "credential material is empty".to_string(),
            ));
        }
        let id = id.unwrap_or_else(CredentialId::generate);
        if self.get(&id).is_some() {
            return Err(CentralinoError::Registration(format!(
                "credential {id} already registered"
            )));
        }
        let sealed = self.vault.seal(material)?;
        let credential = Credential {
            id: id.clone(),
            provider: provider.clone(),
            material: sealed,
            state: KeyState::Available,
            successes: 0,
            failures: 0,
            last_used_at: None,
            last_failure_at: None,
            cooldown_until: None,
            metadata,
            created_at: Utc::now(),
        };
        self.store.save_credential(&credential).await?;
        self.publish(Arc::new(credential.clone()));
        self.sink.emit(&EventEnvelope::new(RouterEvent::CredentialRegistered {
            credential_id: id,
            provider,
        }));
        crate::metrics::set_state_gauges(&self.counts_by_state());
        Ok(credential)
    }

    /// Snapshot of one credential.
    pub(crate) fn get(&self, id: &CredentialId) -> Option<Arc<Credential>> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(id).cloned())
    }

    /// Snapshot of every credential.
    pub(crate) fn all(&self) -> Vec<Arc<Credential>> {
        self.records
            .read()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Apply a state transition, writing the audit record before
    /// publishing the new state. Requesting the current state is a no-op
    /// and returns `Ok(false)` without a record.
    pub(crate) async fn transition(
        &self,
        id: &CredentialId,
        to: KeyState,
        reason: TransitionReason,
        context: String,
        cooldown_until: Option<DateTime<Utc>>,
    ) -> Result<bool, CentralinoError> {
        let entity = self.entity_lock(id);
        let _guard = entity.lock().await;

        let current = self
            .get(id)
            .ok_or_else(|| CentralinoError::not_found(format!("credential {id}")))?;
        if current.state == to {
            return Ok(false);
        }
        if !current.state.can_transition_to(to) {
            return Err(CentralinoError::InvalidTransition {
                credential: id.to_string(),
                from: current.state,
                to,
            });
        }

        let record = StateTransition {
            id: Uuid::new_v4(),
            at: Utc::now(),
            credential_id: id.clone(),
            from: current.state,
            to,
            reason,
            context,
        };
        self.store.save_transition(&record).await?;

        let mut next = Credential::clone(&current);
        next.state = to;
        next.cooldown_until = match to {
            KeyState::Throttled => cooldown_until,
            _ => None,
        };
        self.store.save_credential(&next).await?;
        self.publish(Arc::new(next));

        self.sink.emit(&EventEnvelope::new(RouterEvent::CredentialTransitioned {
            credential_id: id.clone(),
            from: record.from,
            to,
            reason,
        }));
        crate::metrics::set_state_gauges(&self.counts_by_state());
        Ok(true)
    }

    /// Atomically replace a credential's material, resetting its failure
    /// counter while retaining id, state, and metadata.
    pub(crate) async fn rotate(
        &self,
        id: &CredentialId,
        new_material: &[u8],
    ) -> Result<Credential, CentralinoError> {
        if new_material.is_empty() {
            return Err(CentralinoError::Registration(
                "replacement material is empty".to_string(),
            ));
        }
        let entity = self.entity_lock(id);
        let _guard = entity.lock().await;

        let current = self
            .get(id)
            .ok_or_else(|| CentralinoError::not_found(format!("credential {id}")))?;
        let sealed = self.vault.seal(new_material)?;
        let mut next = Credential::clone(&current);
        next.material = sealed;
        next.failures = 0;
        next.last_failure_at = None;
        self.store.save_credential(&next).await?;
        self.publish(Arc::new(next.clone()));
        self.sink.emit(&EventEnvelope::new(RouterEvent::CredentialRotated {
            credential_id: id.clone(),
        }));
        Ok(next)
    }

    /// Disable a credential permanently; the record is retained for audit.
    pub(crate) async fn revoke(
        &self,
        id: &CredentialId,
        context: String,
    ) -> Result<(), CentralinoError> {
        self.transition(id, KeyState::Disabled, TransitionReason::Revoked, context, None)
            .await?;
        self.sink.emit(&EventEnvelope::new(RouterEvent::CredentialRevoked {
            credential_id: id.clone(),
        }));
        Ok(())
    }

    /// Record a dispatch outcome on the credential's counters. Timeouts
    /// never reach this method: with no decision observable upstream, the
    /// credential is not penalized.
    pub(crate) async fn record_outcome(
        &self,
        id: &CredentialId,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CentralinoError> {
        let entity = self.entity_lock(id);
        let _guard = entity.lock().await;

        let Some(current) = self.get(id) else {
            return Ok(());
        };
        let mut next = Credential::clone(&current);
        if success {
            next.successes += 1;
        } else {
            next.failures += 1;
            next.last_failure_at = Some(now);
        }
        next.last_used_at = Some(now);
        self.store.save_credential(&next).await?;
        self.publish(Arc::new(next));
        Ok(())
    }

    /// Every credential of one provider, with due throttle cooldowns
    /// promoted back to Available (recording the transition) before the
    /// snapshot is taken.
    pub(crate) async fn poll_provider(
        &self,
        provider: &ProviderKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<Arc<Credential>>, CentralinoError> {
        let candidates: Vec<Arc<Credential>> = self
            .all()
            .into_iter()
            .filter(|c| c.provider == *provider)
            .collect();

        let mut out = Vec::with_capacity(candidates.len());
        for credential in candidates {
            let promoted = credential.state == KeyState::Throttled
                && credential.cooldown_until.is_none_or(|until| until <= now);
            if promoted {
                self.transition(
                    &credential.id,
                    KeyState::Available,
                    TransitionReason::CooldownElapsed,
                    "throttle cooldown elapsed".to_string(),
                    None,
                )
                .await?;
                if let Some(fresh) = self.get(&credential.id) {
                    out.push(fresh);
                    continue;
                }
            }
            out.push(credential);
        }
        Ok(out)
    }

    /// Open a credential's sealed material for dispatch.
    pub(crate) fn unseal(&self, id: &CredentialId) -> Result<OpenedMaterial, CentralinoError> {
        let credential = self
            .get(id)
            .ok_or_else(|| CentralinoError::not_found(format!("credential {id}")))?;
        self.vault.open(&credential.material)
    }

    /// Credential counts per state, for the admin gauges.
    pub(crate) fn counts_by_state(&self) -> [(KeyState, usize); 5] {
        let mut counts = [
            (KeyState::Available, 0),
            (KeyState::Throttled, 0),
            (KeyState::Exhausted, 0),
            (KeyState::Disabled, 0),
            (KeyState::Invalid, 0),
        ];
        for credential in self.all() {
            for entry in &mut counts {
                if entry.0 == credential.state {
                    entry.1 += 1;
                }
            }
        }
        counts
    }
}
