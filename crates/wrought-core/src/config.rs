//! Runtime configuration reconciliation.
//!
//! Desired values live in `manifest.config` under `<contract>.<key>` names;
//! the pass reads each value back through its getter and calls the setter
//! only when the chain disagrees. Accessor names come from an explicit spec
//! or are inferred from the config key by the compact grammar below.

use crate::engine::Engine;
use crate::resolve::{canonical_text, resolve_value};
use crate::CoreError;
use serde_json::Value;
use tracing::{debug, info};
use wrought_backend::Instance;
use wrought_schema::ContractEntry;

/// One reconciled config binding: the manifest key and the getter/setter
/// pair that reads and writes it on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    pub key: String,
    pub getter: String,
    pub setter: String,
}

/// How a contract's config list is supplied.
#[derive(Debug, Clone, Default)]
pub enum ConfigSpec {
    /// Scan `manifest.config` for keys prefixed `<contract-lowercased>.`.
    #[default]
    Auto,
    /// Explicit key/getter/setter triples.
    Items(Vec<ConfigItem>),
    /// Compact grammar strings: `"localKey[/getter][/setter]"`.
    Compact(Vec<String>),
    /// Derived from the bound contract instance, as compact grammar strings.
    Derived(fn(&Instance) -> Vec<String>),
}

/// Parse one compact grammar string.
///
/// `"a.b/getX/setX"` uses the full key `a.b`; a key without a dot is
/// namespaced as `<contract-lowercased>.localKey`. The getter defaults to
/// the upper-snake constant accessor (`maxSupply` → `MAX_SUPPLY`); a literal
/// `get` middle segment infers `getMaxSupply`. The setter defaults to
/// `setMaxSupply`.
pub(crate) fn parse_config_entry(
    contract_name: &str,
    spec: &str,
) -> Result<ConfigItem, CoreError> {
    let grammar_error = |reason: &str| CoreError::ConfigGrammar {
        spec: spec.to_owned(),
        reason: reason.to_owned(),
    };

    let segments: Vec<&str> = spec.split('/').collect();
    if segments.len() > 3 {
        return Err(grammar_error("expected at most key/getter/setter"));
    }
    if segments.iter().skip(1).any(|s| s.is_empty()) {
        return Err(grammar_error("empty accessor segment"));
    }

    let raw_key = segments[0];
    let (key, local) = match raw_key.rsplit_once('.') {
        Some((_, local)) => (raw_key.to_owned(), local),
        None => (
            format!("{}.{raw_key}", contract_name.to_ascii_lowercase()),
            raw_key,
        ),
    };
    if local.is_empty() {
        return Err(grammar_error("empty config key"));
    }

    let getter = match segments.get(1) {
        None => constant_accessor(local),
        Some(&"get") => format!("get{}", upper_first(local)),
        Some(explicit) => (*explicit).to_owned(),
    };
    let setter = match segments.get(2) {
        None => format!("set{}", upper_first(local)),
        Some(explicit) => (*explicit).to_owned(),
    };

    Ok(ConfigItem { key, getter, setter })
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `maxSupply` → `MAX_SUPPLY`, the Solidity public-constant accessor guess.
fn constant_accessor(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_uppercase());
    }
    out
}

impl Engine<'_> {
    /// Reconcile one contract's runtime configuration.
    ///
    /// A contract with no deployed entry is a no-op. Malformed grammar fails
    /// fast and aborts this contract's remaining list: fatal for the
    /// contract, not for a driver-level batch.
    pub fn update_contract_config(
        &mut self,
        contract_name: &str,
        spec: &ConfigSpec,
    ) -> Result<(), CoreError> {
        let deployed = self
            .manifest
            .contracts
            .get(contract_name)
            .is_some_and(ContractEntry::is_deployed);
        if !deployed {
            debug!("{contract_name} has no deployed entry, skipping config");
            return Ok(());
        }

        let instance = self.contract_instance(contract_name)?;
        let items: Vec<ConfigItem> = match spec {
            ConfigSpec::Auto => self.discover_config_items(contract_name)?,
            ConfigSpec::Items(items) => items.clone(),
            ConfigSpec::Compact(entries) => entries
                .iter()
                .map(|entry| parse_config_entry(contract_name, entry))
                .collect::<Result<_, _>>()?,
            ConfigSpec::Derived(derive) => derive(&instance)
                .iter()
                .map(|entry| parse_config_entry(contract_name, entry))
                .collect::<Result<_, _>>()?,
        };

        info!(
            "config reconciliation for {contract_name} ({} keys)",
            items.len()
        );
        for item in &items {
            self.update_config(&instance, item)?;
        }
        Ok(())
    }

    /// Compare one desired config value against the chain and set it only on
    /// mismatch.
    pub fn update_config(
        &mut self,
        instance: &Instance,
        item: &ConfigItem,
    ) -> Result<(), CoreError> {
        let current = self.backend.call(instance, &item.getter, &[])?;
        let desired = resolve_value(
            self.manifest,
            self.backend,
            &Value::String(format!("config:{}", item.key)),
        )?;

        if canonical_text(&current) == canonical_text(&desired) {
            info!("config {}: in sync", item.key);
            return Ok(());
        }

        info!(
            "config {}: {} -> {}",
            item.key,
            canonical_text(&current),
            canonical_text(&desired)
        );
        let tx = self.backend.send(instance, &item.setter, &[desired])?;
        self.confirm(tx)?;
        Ok(())
    }

    fn discover_config_items(&self, contract_name: &str) -> Result<Vec<ConfigItem>, CoreError> {
        let prefix = format!("{}.", contract_name.to_ascii_lowercase());
        self.manifest
            .config
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .map(|key| parse_config_entry(contract_name, key))
            .collect()
    }
}
