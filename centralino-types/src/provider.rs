//! Provider identity types usable across crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Typed key identifying an upstream provider in routing configuration,
/// policies, and budgets.
///
/// Adapters declare their own key; everything else refers to providers
/// through this type rather than bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderKey(String);

impl ProviderKey {
    /// Construct a new typed provider key.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the inner provider name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderKey {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ProviderKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}
