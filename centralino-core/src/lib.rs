//! centralino-core
//!
//! Core contracts and utilities shared across the centralino ecosystem.
//!
//! - `error`: the unified `CentralinoError` taxonomy.
//! - `adapter`: the `ProviderAdapter` contract and error dispositions.
//! - `store`: the `StateStore` contract and the in-memory reference store.
//! - `vault`: AES-256-GCM sealing of credential material.
//! - `events`: the `EventSink` observability contract.
#![warn(missing_docs)]

/// Provider adapter contract and error classification.
pub mod adapter;
/// Unified error type shared by the router and its collaborators.
pub mod error;
/// Observability sink contract.
pub mod events;
/// State-store contract and the in-memory reference implementation.
pub mod store;
/// Symmetric sealing of credential material.
pub mod vault;

pub use adapter::{AdapterResponse, ErrorDisposition, ProviderAdapter};
pub use error::CentralinoError;
pub use events::{EventSink, NullSink};
pub use store::{MemoryStore, StateStore, StoreRecord};
pub use vault::{OpenedMaterial, VAULT_KEY_ENV, Vault};
