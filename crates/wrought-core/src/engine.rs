use crate::resolve::{resolve_value, resolve_values};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use wrought_backend::{Artifact, BackendError, ChainBackend, Instance, PendingTx, Receipt};
use wrought_schema::{is_empty_address, ContractEntry, Manifest, METADATA_MARKER};
use wrought_store::ManifestStore;

/// Engine configuration fixed at construction: which manifest entries play
/// the proxy-admin and proxy-artifact parts.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Logical name of the proxy-admin contract in the manifest.
    pub proxy_admin: String,
    /// Logical name of the proxy contract artifact.
    pub proxy_contract: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proxy_admin: "ProxyAdmin".to_owned(),
            proxy_contract: "UpgradeProxy".to_owned(),
        }
    }
}

/// Per-contract deployment arguments, merged over empty defaults during
/// batch runs. The wire names (`implArgs`, `initArgs`, `libs`) match the
/// manifest-adjacent override files drivers feed in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploySpec {
    pub impl_args: Vec<Value>,
    pub init_args: Vec<Value>,
    #[serde(alias = "libs")]
    pub libraries: Vec<Value>,
}

/// Compare two addresses over their hex form, ignoring checksum casing.
pub(crate) fn addr_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Central orchestration engine: the idempotent deploy/upgrade state machine
/// plus the role and config reconciliation passes (see `roles`/`config`).
///
/// The manifest is owned by the driver and borrowed exclusively for the run;
/// every mutation that changes a deployed address is flushed through the
/// store before the next chain operation. One operation is in flight at a
/// time; each send is confirmed before the engine proceeds.
pub struct Engine<'a> {
    pub(crate) manifest: &'a mut Manifest,
    pub(crate) backend: &'a dyn ChainBackend,
    store: &'a ManifestStore,
    pub(crate) config: EngineConfig,
    instances: HashMap<String, Instance>,
}

impl<'a> Engine<'a> {
    pub fn new(
        manifest: &'a mut Manifest,
        backend: &'a dyn ChainBackend,
        store: &'a ManifestStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            manifest,
            backend,
            store,
            config,
            instances: HashMap::new(),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        self.manifest
    }

    /// Deploy every manifest entry in document order, skipping metadata
    /// entries and explicit exclusions.
    ///
    /// Artifact-missing failures skip the affected contract and continue;
    /// any other failure aborts the remaining batch. That asymmetry is
    /// deliberate: a missing artifact means "not built in this toolchain",
    /// a failed transaction means the run is no longer trustworthy.
    pub fn deploy_all(
        &mut self,
        excludes: &[String],
        overrides: &HashMap<String, DeploySpec>,
    ) -> Result<(), CoreError> {
        let names: Vec<String> = self.manifest.contracts.keys().cloned().collect();
        for name in names {
            if name.starts_with(METADATA_MARKER) || excludes.iter().any(|e| *e == name) {
                debug!("skipping {name}");
                continue;
            }
            let spec = overrides.get(&name).cloned().unwrap_or_default();
            self.deploy_manifest(&name, &spec)?;
        }
        Ok(())
    }

    /// Drive one manifest entry to its desired state.
    ///
    /// Returns `Ok(None)` when the entry does not exist or its artifact is
    /// not available. Both are skips, not failures.
    pub fn deploy_manifest(
        &mut self,
        name: &str,
        spec: &DeploySpec,
    ) -> Result<Option<Instance>, CoreError> {
        let Some(entry) = self.manifest.contracts.get(name).cloned() else {
            warn!("manifest entry not found: {name}");
            return Ok(None);
        };

        let libraries = self.resolve_library_names(&spec.libraries)?;
        let artifact_name = self.manifest.artifact_name(name).to_owned();
        info!("contract {name} ({artifact_name})");

        let mut artifact = match self.backend.load_artifact(&artifact_name, &libraries) {
            Ok(artifact) => artifact,
            Err(BackendError::ArtifactNotFound(_)) => {
                warn!("no artifact for {name}, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let impl_args = resolve_values(self.manifest, self.backend, &spec.impl_args)?;
        let init_args = resolve_values(self.manifest, self.backend, &spec.init_args)?;

        if !self.link_libraries(name, &mut artifact, &libraries)? {
            return Ok(None);
        }

        let instance = match entry {
            ContractEntry::Simple(recorded) => {
                let instance = self.deploy_or_reuse(name, &artifact, &recorded, &impl_args)?;
                if is_empty_address(&recorded) {
                    self.manifest.contracts.insert(
                        name.to_owned(),
                        ContractEntry::Simple(instance.address().to_owned()),
                    );
                    self.checkpoint()?;
                }
                instance
            }
            ContractEntry::Proxied(prior) => {
                // the impl field may itself be a value expression
                let desired_impl = match resolve_value(
                    self.manifest,
                    self.backend,
                    &Value::String(prior.implementation.clone()),
                )? {
                    Value::String(s) => s,
                    _ => String::new(),
                };

                let impl_instance =
                    self.deploy_or_reuse(name, &artifact, &desired_impl, &impl_args)?;

                let proxy_artifact_name = self
                    .manifest
                    .artifact_name(&self.config.proxy_contract)
                    .to_owned();
                let proxy_artifact = self.backend.load_artifact(&proxy_artifact_name, &[])?;
                let arity = self.backend.constructor_arity(&proxy_artifact)?;
                let admin_address = self.admin_address()?;

                let mut ctor = vec![json!(impl_instance.address()), json!(admin_address)];
                if arity == 3 {
                    // newer proxies take init calldata; initialization happens
                    // separately, so pass an empty payload
                    ctor.push(json!("0x"));
                }

                let proxy_label = format!("{name} proxy");
                let proxy_instance =
                    self.deploy_or_reuse(&proxy_label, &proxy_artifact, &prior.proxy, &ctor)?;

                let admin_instance = self.ensure_proxy_admin(&proxy_instance)?;

                if !prior.has_proxy() {
                    // first initialization of a fresh proxy
                    self.record_proxy_fields(
                        name,
                        impl_instance.address(),
                        proxy_instance.address(),
                    )?;
                    let bound = self
                        .backend
                        .bind_existing(&artifact, proxy_instance.address())?;
                    info!("[{proxy_label}] initialize proxy at {}", bound.address());
                    let tx = self.backend.send(&bound, "initialize", &init_args)?;
                    self.confirm(tx)?;
                } else if !prior.has_implementation() {
                    // existing proxy gets its first recorded implementation
                    self.record_proxy_fields(
                        name,
                        impl_instance.address(),
                        proxy_instance.address(),
                    )?;
                    info!(
                        "[{proxy_label}] set implementation {}",
                        impl_instance.address()
                    );
                    let tx = self.backend.send(
                        &admin_instance,
                        "upgrade",
                        &[json!(proxy_instance.address()), json!(impl_instance.address())],
                    )?;
                    self.confirm(tx)?;
                } else {
                    // both recorded: upgrade only when the chain disagrees
                    let current = self
                        .backend
                        .current_implementation(&admin_instance, proxy_instance.address())?;
                    if addr_eq(current.as_str(), &desired_impl) {
                        debug!("[{proxy_label}] implementation in sync");
                    } else {
                        info!(
                            "[{proxy_label}] upgrade implementation {current} -> {desired_impl}"
                        );
                        let tx = self.backend.send(
                            &admin_instance,
                            "upgrade",
                            &[json!(proxy_instance.address()), json!(desired_impl)],
                        )?;
                        self.confirm(tx)?;
                    }
                }

                self.backend
                    .bind_existing(&artifact, proxy_instance.address())?
            }
        };

        self.instances.insert(name.to_owned(), instance.clone());
        Ok(Some(instance))
    }

    /// Reuse the recorded address when present, deploy otherwise.
    fn deploy_or_reuse(
        &self,
        label: &str,
        artifact: &Artifact,
        recorded: &str,
        ctor_args: &[Value],
    ) -> Result<Instance, CoreError> {
        if !is_empty_address(recorded) {
            info!("[{label}] at {recorded}");
            return Ok(self.backend.bind_existing(artifact, recorded)?);
        }
        debug!("[{label}] deploying with {} constructor args", ctor_args.len());
        let instance = self.backend.deploy_new(artifact, ctor_args)?;
        info!("[{label}] deployed at {}", instance.address());
        Ok(instance)
    }

    /// Bind each library to its recorded manifest address and link it into
    /// the artifact. Returns `Ok(false)` when a library artifact is missing
    /// (the contract is skipped, like any artifact-load failure).
    fn link_libraries(
        &mut self,
        name: &str,
        artifact: &mut Artifact,
        libraries: &[String],
    ) -> Result<bool, CoreError> {
        for lib in libraries {
            let lib_artifact_name = self.manifest.artifact_name(lib).to_owned();
            let lib_artifact = match self.backend.load_artifact(&lib_artifact_name, &[]) {
                Ok(artifact) => artifact,
                Err(BackendError::ArtifactNotFound(_)) => {
                    warn!("no artifact for library {lib}, skipping {name}");
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            let address = self
                .manifest
                .contracts
                .get(lib)
                .and_then(ContractEntry::deployed_address)
                .ok_or_else(|| CoreError::LibraryUnresolved(lib.clone()))?
                .to_owned();
            info!("linking {name} against {lib} at {address}");
            let lib_instance = self.backend.bind_existing(&lib_artifact, &address)?;
            self.backend.link_library(artifact, &lib_instance)?;
        }
        Ok(true)
    }

    /// Admin reconciliation: make sure the proxy is governed by the
    /// configured proxy-admin contract before any upgrade or initialize call,
    /// since upgrade authority is gated by admin identity.
    fn ensure_proxy_admin(&mut self, proxy: &Instance) -> Result<Instance, CoreError> {
        let admin_name = self.config.proxy_admin.clone();
        let admin = self.contract_instance(&admin_name)?;
        let current = self.backend.call(proxy, "admin", &[])?;
        if !addr_eq(current.as_str().unwrap_or_default(), admin.address()) {
            info!(
                "transferring admin of {} to {admin_name} ({})",
                proxy.address(),
                admin.address()
            );
            let tx = self
                .backend
                .send(proxy, "changeAdmin", &[json!(admin.address())])?;
            self.confirm(tx)?;
        }
        Ok(admin)
    }

    /// Bind (and cache) the instance for a deployed manifest entry.
    pub(crate) fn contract_instance(&mut self, name: &str) -> Result<Instance, CoreError> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.clone());
        }
        let entry = self
            .manifest
            .contracts
            .get(name)
            .ok_or_else(|| CoreError::EntryNotFound(name.to_owned()))?;
        let address = entry
            .deployed_address()
            .ok_or_else(|| CoreError::NotDeployed(name.to_owned()))?
            .to_owned();
        let artifact_name = self.manifest.artifact_name(name).to_owned();
        let artifact = self.backend.load_artifact(&artifact_name, &[])?;
        let instance = self.backend.bind_existing(&artifact, &address)?;
        self.instances.insert(name.to_owned(), instance.clone());
        Ok(instance)
    }

    fn admin_address(&self) -> Result<String, CoreError> {
        self.manifest
            .contracts
            .get(&self.config.proxy_admin)
            .and_then(ContractEntry::deployed_address)
            .map(str::to_owned)
            .ok_or_else(|| CoreError::ProxyAdminUnavailable(self.config.proxy_admin.clone()))
    }

    fn record_proxy_fields(
        &mut self,
        name: &str,
        implementation: &str,
        proxy: &str,
    ) -> Result<(), CoreError> {
        if let Some(ContractEntry::Proxied(entry)) = self.manifest.contracts.get_mut(name) {
            entry.record_implementation(implementation);
            entry.record_proxy(proxy);
        }
        self.checkpoint()
    }

    fn resolve_library_names(&self, libraries: &[Value]) -> Result<Vec<String>, CoreError> {
        let resolved = resolve_values(self.manifest, self.backend, libraries)?;
        Ok(resolved
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Flush the manifest to the store. Called after every mutation that
    /// changes a deployed address; the file is the crash-recovery record.
    fn checkpoint(&self) -> Result<(), CoreError> {
        self.store.save(self.manifest)?;
        Ok(())
    }

    pub(crate) fn confirm(&self, pending: PendingTx) -> Result<Receipt, CoreError> {
        let receipt = self.backend.wait_for_confirmation(pending)?;
        debug!("confirmed tx {}", receipt.tx_hash);
        Ok(receipt)
    }
}
