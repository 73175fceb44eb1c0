//! Access-control role reconciliation.
//!
//! Desired role membership lives in `manifest.roles`; the pass queries
//! on-chain membership per `(role, address)` pair and issues only the
//! grant/revoke transactions needed to close the gap.

use crate::engine::Engine;
use crate::resolve::{canonical_text, resolve_values};
use crate::CoreError;
use serde_json::json;
use tracing::info;
use wrought_schema::{RoleSpec, REVOKE_MARKER};

impl Engine<'_> {
    /// Reconcile every role block in the manifest, in document order.
    pub fn grant_roles(&mut self) -> Result<(), CoreError> {
        let role_blocks: Vec<(String, RoleSpec)> = self
            .manifest
            .roles
            .iter()
            .map(|(name, spec)| (name.clone(), spec.clone()))
            .collect();
        for (contract_name, role_spec) in role_blocks {
            self.grant_role(&contract_name, &role_spec)?;
        }
        Ok(())
    }

    /// Reconcile one contract's role block.
    ///
    /// Pairs are processed independently; a transaction failure propagates
    /// and stops the remaining pairs of the current run; whatever was
    /// already confirmed on-chain stays confirmed.
    pub fn grant_role(
        &mut self,
        contract_name: &str,
        role_spec: &RoleSpec,
    ) -> Result<(), CoreError> {
        info!("role configuration for {contract_name}");
        let instance = self.contract_instance(contract_name)?;

        for (label, exprs) in role_spec {
            let (grant, role) = match label.strip_prefix(REVOKE_MARKER) {
                Some(stripped) => (false, stripped),
                None => (true, label.as_str()),
            };
            let role_id = self.backend.hash_role_label(role);
            let addresses = resolve_values(self.manifest, self.backend, exprs)?;

            for resolved in &addresses {
                let address = canonical_text(resolved);
                if address.trim().is_empty() {
                    continue;
                }
                let assigned = self
                    .backend
                    .call(
                        &instance,
                        "hasRole",
                        &[json!(role_id.as_str()), json!(address)],
                    )?
                    .as_bool()
                    .unwrap_or(false);

                match (grant, assigned) {
                    (true, true) => info!("role {role}: {address} (granted)"),
                    (true, false) => {
                        info!("granting role {role} to {address}");
                        let tx = self.backend.send(
                            &instance,
                            "grantRole",
                            &[json!(role_id.as_str()), json!(address)],
                        )?;
                        self.confirm(tx)?;
                    }
                    (false, true) => {
                        info!("revoking role {role} from {address}");
                        let tx = self.backend.send(
                            &instance,
                            "revokeRole",
                            &[json!(role_id.as_str()), json!(address)],
                        )?;
                        self.confirm(tx)?;
                    }
                    (false, false) => info!("role {role}: {address} (no grant)"),
                }
            }
        }
        Ok(())
    }
}
