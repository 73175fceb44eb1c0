pub mod completions;
pub mod config;
pub mod deploy;
pub mod roles;
pub mod status;

use std::path::Path;
use wrought_backend::{select_backend, ChainBackend};
use wrought_core::EngineConfig;
use wrought_schema::Manifest;
use wrought_store::{ManifestStore, StoreLock};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_BACKEND_ERROR: u8 = 3;

/// Everything a reconciliation command needs: the loaded manifest, its
/// store, the selected backend, and the advisory lock held for the run.
pub struct Session {
    pub store: ManifestStore,
    pub manifest: Manifest,
    pub backend: Box<dyn ChainBackend>,
    pub engine_config: EngineConfig,
    _lock: StoreLock,
}

pub fn open_session(
    manifest_path: &Path,
    backend_name: &str,
    proxy_admin: &str,
    proxy: &str,
) -> Result<Session, String> {
    let store = ManifestStore::new(manifest_path);
    let lock = StoreLock::try_acquire(&store.lock_path())
        .map_err(|e| e.to_string())?
        .ok_or_else(|| {
            format!(
                "{} is locked by another wrought process",
                store.path().display()
            )
        })?;
    let manifest = store.load().map_err(|e| e.to_string())?;
    let backend = select_backend(backend_name).map_err(|e| e.to_string())?;

    Ok(Session {
        store,
        manifest,
        backend,
        engine_config: EngineConfig {
            proxy_admin: proxy_admin.to_owned(),
            proxy_contract: proxy.to_owned(),
        },
        _lock: lock,
    })
}
