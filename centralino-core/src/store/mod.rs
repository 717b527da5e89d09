//! The state-store contract.
//!
//! The router persists nothing on its own behalf: credentials, capacity
//! snapshots, routing decisions, and state transitions all flow through a
//! [`StateStore`]. Implementations may be in-memory or networked; the
//! router assumes nothing beyond these method contracts. A failed write on
//! the pre-dispatch decision path aborts the route: a durable record
//! precedes action.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CentralinoError;
use centralino_types::{
    CapacitySnapshot, Credential, CredentialId, QueryFilter, RoutingDecision, StateTransition,
    TimeWindow,
};

/// A record returned from a filtered query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreRecord {
    /// A credential record (material sealed).
    Credential(Credential),
    /// A capacity snapshot.
    Snapshot(CapacitySnapshot),
    /// A routing decision.
    Decision(RoutingDecision),
    /// A state transition.
    Transition(StateTransition),
}

/// Persistence contract consumed by the router.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert or replace a credential record.
    async fn save_credential(&self, credential: &Credential) -> Result<(), CentralinoError>;

    /// Fetch a credential record by id.
    async fn get_credential(
        &self,
        id: &CredentialId,
    ) -> Result<Option<Credential>, CentralinoError>;

    /// Insert or replace the snapshot for one (credential, window) pair.
    async fn save_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<(), CentralinoError>;

    /// Fetch the latest snapshot for one (credential, window) pair.
    async fn get_snapshot(
        &self,
        id: &CredentialId,
        window: TimeWindow,
    ) -> Result<Option<CapacitySnapshot>, CentralinoError>;

    /// Append a routing decision.
    async fn save_decision(&self, decision: &RoutingDecision) -> Result<(), CentralinoError>;

    /// Append a state transition.
    async fn save_transition(&self, transition: &StateTransition) -> Result<(), CentralinoError>;

    /// Return records matching the filter, oldest first, respecting
    /// `offset` and `limit`.
    async fn query(&self, filter: &QueryFilter) -> Result<Vec<StoreRecord>, CentralinoError>;
}
