use crate::{fsync_dir, StoreError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use wrought_schema::{parse_manifest_str, Manifest};

/// Persists the manifest document as pretty-printed JSON.
///
/// Every save is a whole-document replacement: serialize to a temp file in
/// the target directory, fsync, rename over the manifest, fsync the
/// directory. Serialization is deterministic (insertion-order maps, stable
/// pretty-printer), so saving an unchanged manifest reproduces the file
/// byte-for-byte.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Derive the lock file path guarding this manifest.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| "manifest".to_owned(), |n| n.to_string_lossy().into_owned());
        name.push_str(".lock");
        self.path.with_file_name(name)
    }

    pub fn load(&self) -> Result<Manifest, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::ManifestNotFound(
                self.path.display().to_string(),
            ));
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(parse_manifest_str(&content)?)
    }

    pub fn save(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(manifest)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        debug!("manifest saved to {}", self.path.display());
        Ok(())
    }
}
