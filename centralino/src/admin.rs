//! Administrative surface: credential CRUD, capacity and budget
//! management, and record queries.

use std::collections::BTreeMap;

use centralino_core::{CentralinoError, StoreRecord};
use centralino_types::{
    Budget, BudgetScope, CapacitySnapshot, Credential, CredentialId, EnforcementMode,
    ExhaustionForecast, KeyState, ProviderKey, QueryFilter, TimeWindow, TransitionReason,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::Centralino;
use crate::quota::ObserveOutcome;

impl Centralino {
    /// Register new credential material under a generated id.
    ///
    /// The material is sealed by the vault before anything is persisted.
    ///
    /// # Errors
    /// `Registration` if the provider is unknown or the material is empty;
    /// `Crypto` if sealing fails.
    pub async fn register_credential(
        &self,
        material: &[u8],
        provider: impl Into<ProviderKey>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Credential, CentralinoError> {
        let provider = provider.into();
        if !self.knows_provider(&provider) {
            return Err(CentralinoError::Registration(format!(
                "unknown provider {provider}"
            )));
        }
        self.manager.register(None, material, provider, metadata).await
    }

    /// Register new credential material under a caller-chosen id.
    ///
    /// # Errors
    /// As [`register_credential`](Self::register_credential), plus
    /// `Registration` if the id is already taken.
    pub async fn register_credential_named(
        &self,
        id: impl Into<CredentialId>,
        material: &[u8],
        provider: impl Into<ProviderKey>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Credential, CentralinoError> {
        let provider = provider.into();
        if !self.knows_provider(&provider) {
            return Err(CentralinoError::Registration(format!(
                "unknown provider {provider}"
            )));
        }
        self.manager
            .register(Some(id.into()), material, provider, metadata)
            .await
    }

    /// Fetch one credential record (material stays sealed).
    ///
    /// # Errors
    /// `NotFound` if no such credential exists.
    pub fn credential(&self, id: &CredentialId) -> Result<Credential, CentralinoError> {
        self.manager
            .get(id)
            .map(|c| Credential::clone(&c))
            .ok_or_else(|| CentralinoError::not_found(format!("credential {id}")))
    }

    /// Every registered credential.
    #[must_use]
    pub fn credentials(&self) -> Vec<Credential> {
        let mut out: Vec<Credential> = self
            .manager
            .all()
            .into_iter()
            .map(|c| Credential::clone(&c))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Credentials of one provider currently eligible for routing, with
    /// due throttle cooldowns promoted first and active Selection policies
    /// applied (evaluated against a neutral, scope-free intent). Order is
    /// unspecified; the routing engine orders.
    ///
    /// # Errors
    /// `Internal` if the store rejects a cooldown-promotion transition.
    pub async fn eligible_credentials(
        &self,
        provider: impl Into<ProviderKey>,
    ) -> Result<Vec<Credential>, CentralinoError> {
        let provider = provider.into();
        let policies = self.active_policies();
        let probe = centralino_types::RequestIntent::new(provider.clone(), "eligibility-probe");
        Ok(self
            .manager
            .poll_provider(&provider, Utc::now())
            .await?
            .into_iter()
            .filter(|c| c.state == KeyState::Available)
            .filter(|c| policies.evaluate(&probe, c).allowed)
            .map(|c| Credential::clone(&c))
            .collect())
    }

    /// Apply an operator state transition.
    ///
    /// # Errors
    /// `NotFound` for unknown credentials, `InvalidTransition` when the
    /// transition table forbids the move.
    pub async fn transition_credential(
        &self,
        id: &CredentialId,
        to: KeyState,
        context: impl Into<String>,
    ) -> Result<(), CentralinoError> {
        self.manager
            .transition(id, to, TransitionReason::Manual, context.into(), None)
            .await
            .map(|_| ())
    }

    /// Rotate a credential's material, resetting its failure counter while
    /// retaining id, state, and metadata.
    ///
    /// # Errors
    /// `NotFound`, `Registration` (empty material), or `Crypto`.
    pub async fn rotate_credential(
        &self,
        id: &CredentialId,
        new_material: &[u8],
    ) -> Result<Credential, CentralinoError> {
        self.manager.rotate(id, new_material).await
    }

    /// Revoke a credential. The record is retained for audit; eligibility
    /// is zeroed permanently.
    ///
    /// # Errors
    /// `NotFound` for unknown credentials.
    pub async fn revoke_credential(
        &self,
        id: &CredentialId,
        context: impl Into<String>,
    ) -> Result<(), CentralinoError> {
        self.manager.revoke(id, context.into()).await
    }

    /// Create a budget.
    ///
    /// # Errors
    /// `Validation` if the limit is negative or a provider scope names an
    /// unknown provider.
    pub fn create_budget(
        &self,
        scope: BudgetScope,
        limit: Decimal,
        window: TimeWindow,
        enforcement: EnforcementMode,
    ) -> Result<Budget, CentralinoError> {
        if limit < Decimal::ZERO {
            return Err(CentralinoError::validation("budget limit must be >= 0"));
        }
        if let BudgetScope::Provider(provider) = &scope
            && !self.knows_provider(provider)
        {
            return Err(CentralinoError::validation(format!(
                "budget references unknown provider {provider}"
            )));
        }
        Ok(self
            .cost
            .create_budget(scope, limit, window, enforcement, Utc::now()))
    }

    /// Configure (or clear, with `None`) the capacity total for one
    /// (credential, window) pair.
    ///
    /// # Errors
    /// `NotFound` for unknown credentials; `Internal` on store failure.
    pub async fn configure_capacity(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        total: Option<u64>,
    ) -> Result<CapacitySnapshot, CentralinoError> {
        if self.manager.get(id).is_none() {
            return Err(CentralinoError::not_found(format!("credential {id}")));
        }
        self.quota.configure(id, window, total, Utc::now()).await
    }

    /// Record consumed units against a credential's window, driving the
    /// Exhausted transition when the window fills.
    ///
    /// # Errors
    /// `NotFound` for unknown credentials; `Internal` on store failure.
    pub async fn observe_usage(
        &self,
        id: &CredentialId,
        window: TimeWindow,
        units: u64,
        ts: DateTime<Utc>,
    ) -> Result<ObserveOutcome, CentralinoError> {
        if self.manager.get(id).is_none() {
            return Err(CentralinoError::not_found(format!("credential {id}")));
        }
        let outcome = self.quota.observe(id, window, units, ts).await?;
        if outcome.became_exhausted {
            self.manager
                .transition(
                    id,
                    KeyState::Exhausted,
                    TransitionReason::Quota,
                    format!("{window} capacity consumed"),
                    None,
                )
                .await?;
        }
        Ok(outcome)
    }

    /// Latest capacity snapshot for one (credential, window) pair, lazy
    /// reset applied.
    ///
    /// # Errors
    /// `Internal` on store failure during a lazy reset.
    pub async fn capacity_snapshot(
        &self,
        id: &CredentialId,
        window: TimeWindow,
    ) -> Result<Option<CapacitySnapshot>, CentralinoError> {
        self.quota.snapshot(id, window, Utc::now()).await
    }

    /// Force a capacity window back to zero consumed (operator override;
    /// normal resets happen lazily at the window boundary).
    ///
    /// # Errors
    /// `NotFound` if the pair has no snapshot.
    pub async fn reset_capacity(
        &self,
        id: &CredentialId,
        window: TimeWindow,
    ) -> Result<(), CentralinoError> {
        self.quota.reset(id, window, Utc::now()).await
    }

    /// Advisory forecast of when a window exhausts, from the recent
    /// consumption rate. Never feeds back into eligibility.
    #[must_use]
    pub fn predict_exhaustion(
        &self,
        id: &CredentialId,
        window: TimeWindow,
    ) -> ExhaustionForecast {
        self.quota.predict_exhaustion(id, window, Utc::now())
    }

    /// Query persisted records through the state store.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<StoreRecord>, CentralinoError> {
        self.store.query(filter).await
    }
}
