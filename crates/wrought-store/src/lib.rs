//! Manifest persistence for Wrought.
//!
//! This crate provides the storage layer: `ManifestStore` for atomic
//! whole-document replacement of the manifest file, and `StoreLock` for
//! advisory single-writer locking. The manifest file is the sole
//! crash-recovery mechanism: a restarted run re-reads it and treats every
//! populated address field as already satisfied.

pub mod lock;
pub mod store;

pub use lock::StoreLock;
pub use store::ManifestStore;

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
/// Calling `fsync()` on the parent directory makes the rename durable on
/// all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest file not found: {0}")]
    ManifestNotFound(String),
    #[error("manifest error: {0}")]
    Manifest(#[from] wrought_schema::ManifestError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}
