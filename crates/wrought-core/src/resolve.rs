//! The value-expression resolver.
//!
//! Pure over its inputs: no I/O beyond reading the in-memory manifest, but it
//! does read *live* manifest state for `config:` and `address:`. An
//! `address:<name>` expression is only meaningful once `name` has been
//! deployed and its entry populated. The engine performs no dependency
//! sorting; manifest order must be consistent with the reference graph.

use crate::CoreError;
use serde_json::Value;
use wrought_backend::ChainBackend;
use wrought_schema::{ContractEntry, Manifest, ValueExpr};

/// Resolve a single manifest value, recursively over arrays.
pub fn resolve_value(
    manifest: &Manifest,
    backend: &dyn ChainBackend,
    value: &Value,
) -> Result<Value, CoreError> {
    let resolved = match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(manifest, backend, item))
                .collect::<Result<_, _>>()?,
        ),
        Value::String(s) => match ValueExpr::parse(s) {
            ValueExpr::Ether(amount) => Value::String(backend.to_base_units(amount)?),
            ValueExpr::Config(key) => {
                let entry = manifest.config.get(key).cloned().unwrap_or(Value::Null);
                resolve_value(manifest, backend, &entry)?
            }
            ValueExpr::Keccak(data) => Value::String(backend.keccak_text(data)),
            ValueExpr::Address(name) => match manifest.contracts.get(name) {
                Some(ContractEntry::Proxied(entry)) => Value::String(entry.proxy.clone()),
                Some(ContractEntry::Simple(address)) => Value::String(address.clone()),
                None => Value::Null,
            },
            ValueExpr::Literal(_) => value.clone(),
        },
        other => other.clone(),
    };
    Ok(resolved)
}

/// Element-wise [`resolve_value`] over an argument list.
pub fn resolve_values(
    manifest: &Manifest,
    backend: &dyn ChainBackend,
    values: &[Value],
) -> Result<Vec<Value>, CoreError> {
    values
        .iter()
        .map(|value| resolve_value(manifest, backend, value))
        .collect()
}

/// Canonical string form used when comparing desired vs. on-chain values:
/// scalars print bare, null is empty, everything else is its JSON text.
pub(crate) fn canonical_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
