use crate::{hash::keccak_hex, units, BackendError};
use serde_json::Value;
use wrought_schema::{Address, RoleId};

/// A loaded build artifact: compiled contract metadata the backend can
/// deploy or bind. Opaque to the engine apart from introspection through
/// the trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Build-artifact name (after manifest `mapping` translation).
    pub name: String,
    /// Number of constructor inputs reported by the toolchain.
    pub constructor_inputs: usize,
    /// Library names linked into the bytecode so far.
    pub links: Vec<String>,
}

/// A live handle bound to a deployed address. Not persisted; only the
/// address is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    artifact: String,
    address: Address,
}

impl Instance {
    pub fn new(artifact: impl Into<String>, address: impl Into<Address>) -> Self {
        Self {
            artifact: artifact.into(),
            address: address.into(),
        }
    }

    /// Name of the artifact whose ABI this instance answers to.
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }
}

/// A state-changing operation submitted but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: String,
}

/// Confirmation of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
}

/// The capability set a deployment toolchain must supply.
///
/// One logical operation is in flight at a time; every `send` is followed by
/// `wait_for_confirmation` before the engine proceeds. Implementations
/// override the provided hashing/unit methods only if their toolchain
/// disagrees with the chain-universal defaults.
pub trait ChainBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Load a build artifact by name. Fails with
    /// [`BackendError::ArtifactNotFound`] when the toolchain has no such
    /// contract; callers treat that as a skip.
    fn load_artifact(&self, name: &str, libraries: &[String])
        -> Result<Artifact, BackendError>;

    /// Deploy a new contract and wait for inclusion.
    fn deploy_new(&self, artifact: &Artifact, ctor_args: &[Value])
        -> Result<Instance, BackendError>;

    /// Bind to an already-deployed address without touching the chain.
    fn bind_existing(&self, artifact: &Artifact, address: &str)
        -> Result<Instance, BackendError>;

    /// Link a deployed library into an artifact's bytecode. A no-op for
    /// backends without link-time libraries.
    fn link_library(
        &self,
        _artifact: &mut Artifact,
        _library: &Instance,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    /// Read-only method invocation.
    fn call(&self, instance: &Instance, method: &str, args: &[Value])
        -> Result<Value, BackendError>;

    /// State-changing method invocation; returns the pending transaction.
    fn send(&self, instance: &Instance, method: &str, args: &[Value])
        -> Result<PendingTx, BackendError>;

    /// Block until the pending operation is confirmed.
    fn wait_for_confirmation(&self, pending: PendingTx) -> Result<Receipt, BackendError>;

    /// Constructor arity reported by the artifact, used to pick between
    /// proxy constructor generations.
    fn constructor_arity(&self, artifact: &Artifact) -> Result<usize, BackendError>;

    /// The implementation address a proxy currently delegates to, queried
    /// through the proxy admin.
    fn current_implementation(
        &self,
        proxy_admin: &Instance,
        proxy_address: &str,
    ) -> Result<Address, BackendError>;

    /// Role identifier for an access-control label.
    fn hash_role_label(&self, label: &str) -> RoleId {
        RoleId::new(keccak_hex(label.as_bytes()))
    }

    /// Keccak-256 of a UTF-8 string, 0x-prefixed hex.
    fn keccak_text(&self, data: &str) -> String {
        keccak_hex(data.as_bytes())
    }

    /// Convert a decimal token amount to its 18-decimal base-unit string.
    fn to_base_units(&self, amount: &str) -> Result<String, BackendError> {
        units::to_base_units(amount)
    }
}

/// Select a backend implementation by name at process start.
pub fn select_backend(name: &str) -> Result<Box<dyn ChainBackend>, BackendError> {
    match name {
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(BackendError::BackendUnavailable(other.to_owned())),
    }
}
