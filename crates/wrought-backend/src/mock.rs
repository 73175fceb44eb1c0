//! Deterministic in-memory chain for tests and dry runs.
//!
//! Addresses are assigned sequentially, method calls operate on per-contract
//! storage, and every state change is counted so tests can assert that a
//! converged run issues zero transactions.

use crate::adapter::{Artifact, ChainBackend, Instance, PendingTx, Receipt};
use crate::BackendError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use wrought_schema::Address;

#[derive(Debug, Default)]
struct DeployedContract {
    artifact: String,
    ctor_args: Vec<Value>,
    storage: HashMap<String, Value>,
    roles: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
struct MockChain {
    /// Registered artifact name → constructor arity.
    artifacts: HashMap<String, usize>,
    /// Deployed contracts, keyed by normalized address.
    contracts: HashMap<String, DeployedContract>,
    deploy_count: u64,
    tx_count: u64,
}

pub struct MockBackend {
    chain: Mutex<MockChain>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            chain: Mutex::new(MockChain::default()),
        }
    }
}

fn normalize(address: &str) -> String {
    address.to_ascii_lowercase()
}

fn arg_str(args: &[Value], idx: usize) -> &str {
    args.get(idx).and_then(Value::as_str).unwrap_or_default()
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor registering artifacts up front.
    pub fn with_artifacts(artifacts: &[(&str, usize)]) -> Self {
        let backend = Self::new();
        for (name, arity) in artifacts {
            backend.register_artifact(name, *arity);
        }
        backend
    }

    fn chain(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make an artifact loadable, with the given constructor arity.
    pub fn register_artifact(&self, name: &str, constructor_inputs: usize) {
        self.chain()
            .artifacts
            .insert(name.to_owned(), constructor_inputs);
    }

    /// The constructor arguments a contract was deployed with.
    pub fn ctor_args(&self, address: &str) -> Option<Vec<Value>> {
        self.chain()
            .contracts
            .get(&normalize(address))
            .map(|c| c.ctor_args.clone())
    }

    /// Place a contract at a fixed address, as if deployed in an earlier run.
    pub fn seed_contract(&self, address: &str, artifact: &str) {
        self.chain().contracts.insert(
            normalize(address),
            DeployedContract {
                artifact: artifact.to_owned(),
                ..DeployedContract::default()
            },
        );
    }

    /// Preset an on-chain storage slot (e.g. a config value or proxy admin).
    pub fn set_storage(&self, address: &str, key: &str, value: Value) {
        if let Some(contract) = self.chain().contracts.get_mut(&normalize(address)) {
            contract.storage.insert(key.to_owned(), value);
        }
    }

    pub fn storage_value(&self, address: &str, key: &str) -> Option<Value> {
        self.chain()
            .contracts
            .get(&normalize(address))
            .and_then(|c| c.storage.get(key).cloned())
    }

    pub fn has_role(&self, address: &str, role_id: &str, account: &str) -> bool {
        self.chain()
            .contracts
            .get(&normalize(address))
            .is_some_and(|c| {
                c.roles
                    .contains(&(role_id.to_owned(), normalize(account)))
            })
    }

    pub fn is_deployed(&self, address: &str) -> bool {
        self.chain().contracts.contains_key(&normalize(address))
    }

    /// Number of deployments so far.
    pub fn deploy_count(&self) -> u64 {
        self.chain().deploy_count
    }

    /// Number of state-changing operations so far (deployments included).
    pub fn tx_count(&self) -> u64 {
        self.chain().tx_count
    }
}

impl ChainBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn load_artifact(
        &self,
        name: &str,
        _libraries: &[String],
    ) -> Result<Artifact, BackendError> {
        let chain = self.chain();
        let constructor_inputs = chain
            .artifacts
            .get(name)
            .copied()
            .ok_or_else(|| BackendError::ArtifactNotFound(name.to_owned()))?;
        Ok(Artifact {
            name: name.to_owned(),
            constructor_inputs,
            links: Vec::new(),
        })
    }

    fn deploy_new(
        &self,
        artifact: &Artifact,
        ctor_args: &[Value],
    ) -> Result<Instance, BackendError> {
        let mut chain = self.chain();
        chain.deploy_count += 1;
        chain.tx_count += 1;
        let address = format!("0x{:040x}", chain.deploy_count);
        chain.contracts.insert(
            address.clone(),
            DeployedContract {
                artifact: artifact.name.clone(),
                ctor_args: ctor_args.to_vec(),
                ..DeployedContract::default()
            },
        );
        Ok(Instance::new(artifact.name.clone(), address))
    }

    fn bind_existing(
        &self,
        artifact: &Artifact,
        address: &str,
    ) -> Result<Instance, BackendError> {
        Ok(Instance::new(artifact.name.clone(), address))
    }

    fn link_library(
        &self,
        artifact: &mut Artifact,
        library: &Instance,
    ) -> Result<(), BackendError> {
        artifact.links.push(library.artifact().to_owned());
        Ok(())
    }

    fn call(
        &self,
        instance: &Instance,
        method: &str,
        args: &[Value],
    ) -> Result<Value, BackendError> {
        let chain = self.chain();
        let contract = chain
            .contracts
            .get(&normalize(instance.address()))
            .ok_or_else(|| BackendError::UnknownAddress(instance.address().to_owned()))?;

        let value = match method {
            "hasRole" => {
                let key = (
                    arg_str(args, 0).to_owned(),
                    normalize(arg_str(args, 1)),
                );
                Value::Bool(contract.roles.contains(&key))
            }
            "admin" => contract
                .storage
                .get("admin")
                .cloned()
                .or_else(|| contract.ctor_args.get(1).cloned())
                .unwrap_or(Value::Null),
            getter => {
                let slot = getter.strip_prefix("get").unwrap_or(getter);
                contract.storage.get(slot).cloned().unwrap_or(Value::Null)
            }
        };
        Ok(value)
    }

    fn send(
        &self,
        instance: &Instance,
        method: &str,
        args: &[Value],
    ) -> Result<PendingTx, BackendError> {
        let mut chain = self.chain();
        chain.tx_count += 1;
        let hash = format!("0x{:064x}", chain.tx_count);

        if method == "upgrade" {
            // sent to the proxy admin; mutates the proxy named in the args
            let proxy = normalize(arg_str(args, 0));
            let implementation = arg_str(args, 1).to_owned();
            let target = chain
                .contracts
                .get_mut(&proxy)
                .ok_or_else(|| BackendError::UnknownAddress(proxy.clone()))?;
            target
                .storage
                .insert("implementation".to_owned(), Value::String(implementation));
            return Ok(PendingTx { hash });
        }

        let address = normalize(instance.address());
        let contract = chain
            .contracts
            .get_mut(&address)
            .ok_or_else(|| BackendError::UnknownAddress(instance.address().to_owned()))?;

        match method {
            "grantRole" => {
                contract.roles.insert((
                    arg_str(args, 0).to_owned(),
                    normalize(arg_str(args, 1)),
                ));
            }
            "revokeRole" => {
                contract.roles.remove(&(
                    arg_str(args, 0).to_owned(),
                    normalize(arg_str(args, 1)),
                ));
            }
            "changeAdmin" => {
                contract.storage.insert(
                    "admin".to_owned(),
                    args.first().cloned().unwrap_or(Value::Null),
                );
            }
            "initialize" => {
                contract
                    .storage
                    .insert("initialized".to_owned(), Value::Bool(true));
                contract
                    .storage
                    .insert("init_args".to_owned(), Value::Array(args.to_vec()));
            }
            setter if setter.starts_with("set") && setter.len() > 3 => {
                contract.storage.insert(
                    setter["set".len()..].to_owned(),
                    args.first().cloned().unwrap_or(Value::Null),
                );
            }
            other => {
                return Err(BackendError::UnknownMethod {
                    address,
                    method: other.to_owned(),
                })
            }
        }
        Ok(PendingTx { hash })
    }

    fn wait_for_confirmation(&self, pending: PendingTx) -> Result<Receipt, BackendError> {
        Ok(Receipt {
            tx_hash: pending.hash,
        })
    }

    fn constructor_arity(&self, artifact: &Artifact) -> Result<usize, BackendError> {
        Ok(artifact.constructor_inputs)
    }

    fn current_implementation(
        &self,
        _proxy_admin: &Instance,
        proxy_address: &str,
    ) -> Result<Address, BackendError> {
        let chain = self.chain();
        let proxy = chain
            .contracts
            .get(&normalize(proxy_address))
            .ok_or_else(|| BackendError::UnknownAddress(proxy_address.to_owned()))?;
        proxy
            .storage
            .get("implementation")
            .or_else(|| proxy.ctor_args.first())
            .and_then(Value::as_str)
            .map(Address::from)
            .ok_or_else(|| {
                BackendError::Transaction(format!(
                    "proxy {proxy_address} reports no implementation"
                ))
            })
    }
}
