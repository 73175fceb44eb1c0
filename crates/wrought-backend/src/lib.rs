//! Chain backend abstraction for Wrought.
//!
//! This crate defines the boundary between the reconciliation engine and a
//! concrete deployment toolchain: the pluggable `ChainBackend` trait
//! (artifact loading, deployment, binding, method calls, confirmation
//! waiting), backend selection by name, keccak-256 and base-unit helpers,
//! and a deterministic in-memory `MockBackend`.

pub mod adapter;
pub mod hash;
pub mod mock;
pub mod units;

pub use adapter::{
    select_backend, Artifact, ChainBackend, Instance, PendingTx, Receipt,
};
pub use hash::keccak_hex;
pub use mock::MockBackend;
pub use units::to_base_units;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("backend '{0}' is not available")]
    BackendUnavailable(String),
    #[error("no contract deployed at {0}")]
    UnknownAddress(String),
    #[error("contract at {address} does not expose method '{method}'")]
    UnknownMethod { address: String, method: String },
    #[error("invalid decimal amount: '{0}'")]
    InvalidAmount(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
}
