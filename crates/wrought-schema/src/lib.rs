//! Manifest parsing and value-expression grammar for Wrought.
//!
//! This crate defines the schema layer: the desired-state manifest document
//! (`Manifest`), contract entry shapes (`ContractEntry`), the string-prefix
//! value-expression grammar (`ValueExpr`), and the identifier newtypes shared
//! by the other crates.

pub mod expr;
pub mod manifest;
pub mod types;

pub use expr::ValueExpr;
pub use manifest::{
    is_empty_address, parse_manifest_file, parse_manifest_str, ContractEntry, Manifest,
    ManifestError, ProxyEntry, RoleSpec, METADATA_MARKER, REVOKE_MARKER,
};
pub use types::{Address, RoleId};
