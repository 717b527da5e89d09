//! In-memory reference implementation of the state store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{StateStore, StoreRecord};
use crate::error::CentralinoError;
use centralino_types::{
    CapacitySnapshot, Credential, CredentialId, QueryFilter, RecordKind, RoutingDecision,
    StateTransition, TimeWindow,
};

#[derive(Default)]
struct MemoryInner {
    credentials: HashMap<CredentialId, Credential>,
    snapshots: HashMap<(CredentialId, TimeWindow), CapacitySnapshot>,
    decisions: Vec<RoutingDecision>,
    transitions: Vec<StateTransition>,
}

/// Reference store keeping every record in process memory.
///
/// Suited to tests, demos, and single-process deployments; anything that
/// must survive a restart needs a durable implementation behind the same
/// trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, CentralinoError> {
        self.inner
            .lock()
            .map_err(|_| CentralinoError::internal("state store lock poisoned"))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save_credential(&self, credential: &Credential) -> Result<(), CentralinoError> {
        let mut inner = self.lock()?;
        inner
            .credentials
            .insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn get_credential(
        &self,
        id: &CredentialId,
    ) -> Result<Option<Credential>, CentralinoError> {
        let inner = self.lock()?;
        Ok(inner.credentials.get(id).cloned())
    }

    async fn save_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<(), CentralinoError> {
        let mut inner = self.lock()?;
        inner.snapshots.insert(
            (snapshot.credential_id.clone(), snapshot.window),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn get_snapshot(
        &self,
        id: &CredentialId,
        window: TimeWindow,
    ) -> Result<Option<CapacitySnapshot>, CentralinoError> {
        let inner = self.lock()?;
        Ok(inner.snapshots.get(&(id.clone(), window)).cloned())
    }

    async fn save_decision(&self, decision: &RoutingDecision) -> Result<(), CentralinoError> {
        let mut inner = self.lock()?;
        inner.decisions.push(decision.clone());
        Ok(())
    }

    async fn save_transition(&self, transition: &StateTransition) -> Result<(), CentralinoError> {
        let mut inner = self.lock()?;
        inner.transitions.push(transition.clone());
        Ok(())
    }

    async fn query(&self, filter: &QueryFilter) -> Result<Vec<StoreRecord>, CentralinoError> {
        let inner = self.lock()?;
        let mut matched: Vec<StoreRecord> = match filter.entity {
            RecordKind::Credential => {
                let mut creds: Vec<&Credential> = inner
                    .credentials
                    .values()
                    .filter(|c| {
                        filter
                            .credential_id
                            .as_ref()
                            .is_none_or(|want| c.id == *want)
                            && filter.provider.as_ref().is_none_or(|want| c.provider == *want)
                            && filter.state.is_none_or(|want| c.state == want)
                            && filter.covers(c.created_at)
                    })
                    .collect();
                creds.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                creds
                    .into_iter()
                    .map(|c| StoreRecord::Credential(c.clone()))
                    .collect()
            }
            RecordKind::Decision => inner
                .decisions
                .iter()
                .filter(|d| {
                    filter
                        .credential_id
                        .as_ref()
                        .is_none_or(|want| d.chosen == *want)
                        && filter.covers(d.at)
                })
                .map(|d| StoreRecord::Decision(d.clone()))
                .collect(),
            RecordKind::Transition => inner
                .transitions
                .iter()
                .filter(|t| {
                    filter
                        .credential_id
                        .as_ref()
                        .is_none_or(|want| t.credential_id == *want)
                        && filter.state.is_none_or(|want| t.to == want)
                        && filter.covers(t.at)
                })
                .map(|t| StoreRecord::Transition(t.clone()))
                .collect(),
            RecordKind::Snapshot => {
                let mut snaps: Vec<&CapacitySnapshot> = inner
                    .snapshots
                    .values()
                    .filter(|s| {
                        filter
                            .credential_id
                            .as_ref()
                            .is_none_or(|want| s.credential_id == *want)
                            && filter.covers(s.updated_at)
                    })
                    .collect();
                snaps.sort_by(|a, b| {
                    a.updated_at
                        .cmp(&b.updated_at)
                        .then(a.credential_id.cmp(&b.credential_id))
                });
                snaps
                    .into_iter()
                    .map(|s| StoreRecord::Snapshot(s.clone()))
                    .collect()
            }
        };

        let offset = filter.offset.min(matched.len());
        matched.drain(..offset);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
