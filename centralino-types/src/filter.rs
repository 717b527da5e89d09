//! Query filters for the admin record-inspection surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::{CredentialId, KeyState};
use crate::provider::ProviderKey;

/// Kind of record a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Credential records.
    Credential,
    /// Routing decisions.
    Decision,
    /// State transitions.
    Transition,
    /// Capacity snapshots.
    Snapshot,
}

/// Filter for querying persisted records through the state store.
///
/// Fields that do not apply to the targeted kind are ignored (a decision
/// has no key state, for example).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Kind of record to return.
    pub entity: RecordKind,
    /// Restrict to one credential.
    pub credential_id: Option<CredentialId>,
    /// Restrict to one provider (credential records only).
    pub provider: Option<ProviderKey>,
    /// Restrict to one key state.
    pub state: Option<KeyState>,
    /// Inclusive lower bound on the record instant.
    pub from_ts: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the record instant.
    pub to_ts: Option<DateTime<Utc>>,
    /// Maximum records to return.
    pub limit: Option<usize>,
    /// Records to skip before returning.
    pub offset: usize,
}

impl QueryFilter {
    /// Filter matching every record of `entity`.
    #[must_use]
    pub const fn new(entity: RecordKind) -> Self {
        Self {
            entity,
            credential_id: None,
            provider: None,
            state: None,
            from_ts: None,
            to_ts: None,
            limit: None,
            offset: 0,
        }
    }

    /// Restrict to one credential.
    #[must_use]
    pub fn credential(mut self, id: CredentialId) -> Self {
        self.credential_id = Some(id);
        self
    }

    /// Restrict to one provider.
    #[must_use]
    pub fn provider(mut self, provider: ProviderKey) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Restrict to one key state.
    #[must_use]
    pub const fn state(mut self, state: KeyState) -> Self {
        self.state = Some(state);
        self
    }

    /// Bound the record instant from below (inclusive).
    #[must_use]
    pub const fn from_ts(mut self, from: DateTime<Utc>) -> Self {
        self.from_ts = Some(from);
        self
    }

    /// Bound the record instant from above (exclusive).
    #[must_use]
    pub const fn to_ts(mut self, to: DateTime<Utc>) -> Self {
        self.to_ts = Some(to);
        self
    }

    /// Cap the number of records returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading records (pagination).
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether an instant falls inside the filter's time bounds.
    #[must_use]
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.from_ts
            && at < from
        {
            return false;
        }
        if let Some(to) = self.to_ts
            && at >= to
        {
            return false;
        }
        true
    }
}
