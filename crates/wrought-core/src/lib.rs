//! Reconciliation engine for Wrought.
//!
//! This crate ties together the manifest schema, the manifest store, and a
//! chain backend into the `Engine`: the idempotent deploy/upgrade state
//! machine for proxy-pattern contracts, plus the role and configuration
//! reconciliation passes and the value-expression resolver.

pub mod config;
pub mod engine;
pub mod resolve;
pub mod roles;

pub use config::{ConfigItem, ConfigSpec};
pub use engine::{DeploySpec, Engine, EngineConfig};
pub use resolve::{resolve_value, resolve_values};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] wrought_schema::ManifestError),
    #[error("store error: {0}")]
    Store(#[from] wrought_store::StoreError),
    #[error("backend error: {0}")]
    Backend(#[from] wrought_backend::BackendError),
    #[error("contract '{0}' is not in the manifest")]
    EntryNotFound(String),
    #[error("contract '{0}' has no deployed address")]
    NotDeployed(String),
    #[error("proxy admin contract '{0}' has no deployed address")]
    ProxyAdminUnavailable(String),
    #[error("library '{0}' has no recorded address")]
    LibraryUnresolved(String),
    #[error("invalid config spec '{spec}': {reason}")]
    ConfigGrammar { spec: String, reason: String },
}
