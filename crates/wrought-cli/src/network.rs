//! Network and account configuration loading.
//!
//! Each network lives in its own JSON file (`<name>.json`) under a networks
//! directory, with the settings nested under a top-level `network` key.
//! Account material is resolved through the environment first
//! (`ACCOUNT_<NAME>`, then `<NAME>`), falling back to the configured value;
//! material containing spaces is a mnemonic phrase, otherwise a private key.

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Resolved signing material for a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSource {
    Mnemonic(String),
    PrivateKey(String),
}

/// One loadable network definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub url: String,
    pub chain_id: Option<u64>,
    pub account: AccountSource,
    pub explorer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    network: Option<NetworkSection>,
}

#[derive(Debug, Deserialize)]
struct NetworkSection {
    url: String,
    #[serde(default, rename = "chainId", alias = "network_id")]
    chain_id: Option<u64>,
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    explorer: Option<String>,
}

/// Load every `<name>.json` in the directory. Files without a `network` key
/// or with other extensions are ignored; unparsable files are skipped with a
/// warning rather than failing the whole directory.
pub fn load_networks(dir: &Path) -> Result<IndexMap<String, Network>, String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("cannot read networks dir {}: {e}", dir.display()))?;
    let mut paths: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    paths.sort();

    let mut networks = IndexMap::new();
    for path in paths {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_json {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let parsed: NetworkFile = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("skipping invalid network file {}: {e}", path.display());
                continue;
            }
        };
        let Some(section) = parsed.network else {
            continue;
        };

        let account = resolve_account(section.account.as_deref())?;
        networks.insert(
            name.to_owned(),
            Network {
                name: name.to_owned(),
                url: section.url,
                chain_id: section.chain_id,
                account,
                explorer: section.explorer,
            },
        );
    }
    Ok(networks)
}

fn resolve_account(configured: Option<&str>) -> Result<AccountSource, String> {
    let name = configured.unwrap_or("wallet");
    let env_name = name.to_ascii_uppercase().replace('-', "_");

    let material = std::env::var(format!("ACCOUNT_{env_name}"))
        .or_else(|_| std::env::var(&env_name))
        .ok()
        .or_else(|| configured.map(str::to_owned));

    match material {
        Some(m) if !m.trim().is_empty() => Ok(if m.contains(' ') {
            AccountSource::Mnemonic(m)
        } else {
            AccountSource::PrivateKey(m)
        }),
        _ => Err(format!(
            "no account material for '{name}' (set ACCOUNT_{env_name})"
        )),
    }
}
