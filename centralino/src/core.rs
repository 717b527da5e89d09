use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use centralino_core::{CentralinoError, EventSink, MemoryStore, NullSink, ProviderAdapter, StateStore, Vault};
use centralino_types::{
    Budget, BudgetScope, EnforcementMode, EventEnvelope, Policy, PolicyScope, PolicySet,
    ProviderKey, RouterConfig, RouterEvent, TimeWindow,
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::cost::CostController;
use crate::manager::CredentialManager;
use crate::quota::QuotaEngine;
use crate::router::engine::LatencyBook;

/// The router façade: owns the adapter registry, the active policy set,
/// and the engines that track credentials, capacity, and spend.
impl std::fmt::Debug for Centralino {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Centralino").finish_non_exhaustive()
    }
}

pub struct Centralino {
    pub(crate) adapters: RwLock<Arc<HashMap<ProviderKey, Arc<dyn ProviderAdapter>>>>,
    pub(crate) policies: RwLock<Arc<PolicySet>>,
    pub(crate) manager: CredentialManager,
    pub(crate) quota: QuotaEngine,
    pub(crate) cost: CostController,
    pub(crate) stats: LatencyBook,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) cfg: RouterConfig,
}

/// Builder for constructing a [`Centralino`] router with custom
/// collaborators and configuration.
pub struct CentralinoBuilder {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    store: Option<Arc<dyn StateStore>>,
    vault: Option<Vault>,
    sink: Option<Arc<dyn EventSink>>,
    cfg: RouterConfig,
    policies: Vec<Policy>,
    budgets: Vec<(BudgetScope, Decimal, TimeWindow, EnforcementMode)>,
}

impl Default for CentralinoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralinoBuilder {
    /// Create a new builder with sensible defaults.
    ///
    /// Behavior and trade-offs:
    /// - Starts with no adapters; you must register at least one via
    ///   `with_adapter`.
    /// - Defaults: in-memory store, vault key from the environment
    ///   (ephemeral fallback), no event sink, no policies, no budgets,
    ///   reliability objective, 3 attempts, 30s per-dispatch timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: vec![],
            store: None,
            vault: None,
            sink: None,
            cfg: RouterConfig::default(),
            policies: vec![],
            budgets: vec![],
        }
    }

    /// Register a provider adapter.
    ///
    /// Behavior and trade-offs:
    /// - One adapter per provider key; duplicates are rejected at build
    ///   time rather than silently shadowed.
    /// - More providers can be added after build via
    ///   [`Centralino::register_provider`].
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Install a state store. Defaults to [`MemoryStore`].
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Install an explicit vault instead of reading the environment.
    #[must_use]
    pub fn vault(mut self, vault: Vault) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Install an event sink. Defaults to a sink that drops everything.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the whole router configuration.
    #[must_use]
    pub fn config(mut self, cfg: RouterConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Seed the active policy set.
    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Seed a budget.
    #[must_use]
    pub fn with_budget(
        mut self,
        scope: BudgetScope,
        limit: Decimal,
        window: TimeWindow,
        enforcement: EnforcementMode,
    ) -> Self {
        self.budgets.push((scope, limit, window, enforcement));
        self
    }

    /// Build the router.
    ///
    /// # Errors
    /// - `Validation` if no adapters were registered, two adapters share a
    ///   key, a policy is malformed, the default objective is unusable, or
    ///   a policy/budget references an unknown provider.
    /// - `Crypto` if the vault key environment variable is set but
    ///   malformed.
    pub fn build(self) -> Result<Centralino, CentralinoError> {
        if self.adapters.is_empty() {
            return Err(CentralinoError::validation(
                "no adapters registered; add at least one via with_adapter(...)",
            ));
        }
        if !self.cfg.default_objective.is_valid() {
            return Err(CentralinoError::validation(
                "default objective has an empty or negative weight set",
            ));
        }

        let mut registry: HashMap<ProviderKey, Arc<dyn ProviderAdapter>> = HashMap::new();
        for adapter in self.adapters {
            let key = adapter.key();
            if registry.insert(key.clone(), adapter).is_some() {
                return Err(CentralinoError::validation(format!(
                    "duplicate adapter for provider {key}"
                )));
            }
        }
        let known: HashSet<&ProviderKey> = registry.keys().collect();

        for policy in &self.policies {
            if !policy.is_well_formed() {
                return Err(CentralinoError::validation(format!(
                    "policy {} mixes rule kinds",
                    policy.id
                )));
            }
            if let PolicyScope::Provider(provider) = &policy.scope
                && !known.contains(provider)
            {
                return Err(CentralinoError::validation(format!(
                    "policy {} references unknown provider {provider}",
                    policy.id
                )));
            }
        }
        for (scope, limit, _, _) in &self.budgets {
            if *limit < Decimal::ZERO {
                return Err(CentralinoError::validation("budget limit must be >= 0"));
            }
            if let BudgetScope::Provider(provider) = scope
                && !known.contains(provider)
            {
                return Err(CentralinoError::validation(format!(
                    "budget references unknown provider {provider}"
                )));
            }
        }

        let vault = match self.vault {
            Some(vault) => vault,
            None => Vault::from_env()?,
        };
        let store: Arc<dyn StateStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let sink: Arc<dyn EventSink> = self.sink.unwrap_or_else(|| Arc::new(NullSink));

        if vault.is_ephemeral() {
            sink.emit(&EventEnvelope::new(RouterEvent::VaultKeyEphemeral));
        }

        let vault = Arc::new(vault);
        let cost = CostController::new(Arc::clone(&sink));
        let now = Utc::now();
        for (scope, limit, window, enforcement) in self.budgets {
            cost.create_budget(scope, limit, window, enforcement, now);
        }

        Ok(Centralino {
            adapters: RwLock::new(Arc::new(registry)),
            policies: RwLock::new(Arc::new(PolicySet::new(self.policies))),
            manager: CredentialManager::new(vault, Arc::clone(&store), Arc::clone(&sink)),
            quota: QuotaEngine::new(
                self.cfg.tier_thresholds,
                Arc::clone(&store),
                Arc::clone(&sink),
            ),
            cost,
            stats: LatencyBook::new(),
            store,
            sink,
            cfg: self.cfg,
        })
    }
}

impl Centralino {
    /// Start building a new router.
    #[must_use]
    pub fn builder() -> CentralinoBuilder {
        CentralinoBuilder::new()
    }

    /// Register an additional provider adapter after build.
    ///
    /// The registry is copy-on-write: readers keep routing against the old
    /// snapshot until the new one is published.
    ///
    /// # Errors
    /// `Validation` if an adapter with the same key already exists.
    pub fn register_provider(
        &self,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), CentralinoError> {
        let mut slot = self
            .adapters
            .write()
            .map_err(|_| CentralinoError::internal("adapter registry lock poisoned"))?;
        let key = adapter.key();
        if slot.contains_key(&key) {
            return Err(CentralinoError::validation(format!(
                "duplicate adapter for provider {key}"
            )));
        }
        let mut next = HashMap::clone(&slot);
        next.insert(key, adapter);
        *slot = Arc::new(next);
        Ok(())
    }

    /// Resolve the adapter for a provider.
    pub(crate) fn adapter_for(
        &self,
        provider: &ProviderKey,
    ) -> Result<Arc<dyn ProviderAdapter>, CentralinoError> {
        let registry = self
            .adapters
            .read()
            .map_err(|_| CentralinoError::internal("adapter registry lock poisoned"))?;
        registry
            .get(provider)
            .cloned()
            .ok_or_else(|| CentralinoError::unknown_provider(provider.as_str()))
    }

    /// Whether a provider has a registered adapter.
    pub(crate) fn knows_provider(&self, provider: &ProviderKey) -> bool {
        self.adapters
            .read()
            .map(|registry| registry.contains_key(provider))
            .unwrap_or(false)
    }

    /// Snapshot of the active policy set.
    pub(crate) fn active_policies(&self) -> Arc<PolicySet> {
        self.policies
            .read()
            .map(|set| Arc::clone(&set))
            .unwrap_or_default()
    }

    /// Replace the active policy set. Policies are immutable once active;
    /// this publishes a whole new set.
    ///
    /// # Errors
    /// `Validation` if a policy is malformed or references an unknown
    /// provider.
    pub fn set_policies(&self, policies: Vec<Policy>) -> Result<(), CentralinoError> {
        for policy in &policies {
            if !policy.is_well_formed() {
                return Err(CentralinoError::validation(format!(
                    "policy {} mixes rule kinds",
                    policy.id
                )));
            }
            if let PolicyScope::Provider(provider) = &policy.scope
                && !self.knows_provider(provider)
            {
                return Err(CentralinoError::validation(format!(
                    "policy {} references unknown provider {provider}",
                    policy.id
                )));
            }
        }
        let mut slot = self
            .policies
            .write()
            .map_err(|_| CentralinoError::internal("policy set lock poisoned"))?;
        *slot = Arc::new(PolicySet::new(policies));
        Ok(())
    }

    /// Currently configured budgets.
    #[must_use]
    pub fn budgets(&self) -> Vec<Budget> {
        self.cost.budgets()
    }

    /// The active policy set, in precedence order.
    #[must_use]
    pub fn policies(&self) -> Vec<Policy> {
        self.active_policies().policies().to_vec()
    }

    /// Router configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &RouterConfig {
        &self.cfg
    }

    /// Shut the router down.
    ///
    /// The router owns no background tasks: quota resets are lazy and
    /// every decision is persisted synchronously on the route path, so
    /// shutdown amounts to dropping the store and sink handles. Consuming
    /// `self` guarantees no further routes can start.
    pub fn shutdown(self) {
        drop(self);
    }
}
