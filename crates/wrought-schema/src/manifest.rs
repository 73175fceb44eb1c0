use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
}

/// Entry names starting with this marker are metadata, not deployable contracts.
pub const METADATA_MARKER: char = '@';

/// Role labels starting with this marker are revoked instead of granted.
pub const REVOKE_MARKER: char = '-';

/// Addresses are recorded as strings; an unset field is the empty string.
pub fn is_empty_address(value: &str) -> bool {
    value.trim().is_empty()
}

/// Role label → ordered list of value expressions resolving to addresses.
/// A label prefixed with `-` means the role is revoked instead of granted.
pub type RoleSpec = IndexMap<String, Vec<Value>>;

/// The desired-state document driving all reconciliation.
///
/// Insertion order of `contracts` is meaningful: entries deploy in document
/// order, and later entries may reference earlier ones through `address:`
/// expressions. All maps preserve insertion order for that reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub contracts: IndexMap<String, ContractEntry>,

    #[serde(default)]
    pub roles: IndexMap<String, RoleSpec>,

    #[serde(default)]
    pub config: IndexMap<String, Value>,

    /// Logical contract name → build-artifact name.
    #[serde(default)]
    pub mapping: IndexMap<String, String>,
}

impl Manifest {
    /// Resolve a logical name to its build-artifact name.
    pub fn artifact_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.mapping.get(name).map_or(name, String::as_str)
    }
}

/// A single contract in the manifest: either a plain deployed address
/// (simple contract) or an upgradeable-proxy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContractEntry {
    Proxied(ProxyEntry),
    Simple(String),
}

impl ContractEntry {
    /// The address a caller should interact with, if the entry is deployed:
    /// the proxy address for proxied entries, the recorded address otherwise.
    pub fn deployed_address(&self) -> Option<&str> {
        let addr = match self {
            Self::Proxied(p) => p.proxy.as_str(),
            Self::Simple(a) => a.as_str(),
        };
        if is_empty_address(addr) {
            None
        } else {
            Some(addr)
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed_address().is_some()
    }
}

/// Proxy-pattern entry: a stable proxy address delegating to a replaceable
/// implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    #[serde(rename = "impl", default)]
    pub implementation: String,

    #[serde(default)]
    pub proxy: String,
}

impl ProxyEntry {
    pub fn has_implementation(&self) -> bool {
        !is_empty_address(&self.implementation)
    }

    pub fn has_proxy(&self) -> bool {
        !is_empty_address(&self.proxy)
    }

    /// Record the implementation address. The implementation may be
    /// superseded across upgrades, but never cleared.
    pub fn record_implementation(&mut self, address: impl Into<String>) {
        let address = address.into();
        if !is_empty_address(&address) {
            self.implementation = address;
        }
    }

    /// Record the proxy address. Invariant: once non-empty, the proxy
    /// address never reverts to empty.
    pub fn record_proxy(&mut self, address: impl Into<String>) {
        let address = address.into();
        if !is_empty_address(&address) {
            self.proxy = address;
        }
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
