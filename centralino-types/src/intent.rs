//! Request intents and the receipt returned by a completed route.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::credential::CredentialId;
use crate::decision::Objective;
use crate::provider::ProviderKey;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One message of the conversation being dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the router needs to dispatch one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIntent {
    /// Target provider.
    pub provider: ProviderKey,
    /// Target model id.
    pub model: String,
    /// Conversation to dispatch.
    pub messages: Vec<ChatMessage>,
    /// Opaque provider parameters (temperature, max tokens, ...).
    pub params: BTreeMap<String, serde_json::Value>,
    /// Objective override for this request.
    pub objective: Option<Objective>,
    /// Team scope key for budgets and policies.
    pub team: Option<String>,
    /// Tenant scope key.
    pub tenant: Option<String>,
    /// Correlation id propagated into every event this request produces.
    pub correlation_id: String,
}

impl RequestIntent {
    /// Build an intent for one provider and model with a fresh correlation id.
    pub fn new(provider: impl Into<ProviderKey>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            messages: Vec::new(),
            params: BTreeMap::new(),
            objective: None,
            team: None,
            tenant: None,
            correlation_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Append a message.
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the objective override.
    #[must_use]
    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = Some(objective);
        self
    }

    /// Set the team scope key.
    #[must_use]
    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Set the tenant scope key.
    #[must_use]
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Set a provider parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Total character length of all message contents; the usual basis for
    /// token estimation when the adapter has nothing better.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }

    /// Stable fingerprint of (provider, model, messages) recorded on routing
    /// decisions instead of the message bodies themselves.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.provider.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.model.as_bytes());
        for message in &self.messages {
            hasher.update([0u8]);
            hasher.update(message.content.as_bytes());
        }
        let digest = hasher.finalize();
        digest
            .iter()
            .take(16)
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Token usage reported by the upstream for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Combined token count.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.input + self.output
    }
}

/// Terminal outcome of a successful `route` call.
///
/// Carries the credential *id* only; opened material never leaves the
/// dispatch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReceipt {
    /// Upstream response content.
    pub content: String,
    /// Credential the request was dispatched through.
    pub credential_id: CredentialId,
    /// Model that served the request.
    pub model: String,
    /// Reported token usage.
    pub usage: TokenUsage,
    /// Actual (reconciled) cost.
    pub cost: Decimal,
    /// Wall time of the whole route call.
    pub elapsed: Duration,
    /// Dispatch attempts consumed, including the successful one.
    pub attempts: u32,
    /// Id of the routing decision that chose the credential.
    pub decision_id: Uuid,
}
