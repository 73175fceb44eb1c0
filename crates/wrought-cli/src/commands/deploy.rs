use super::{Session, EXIT_SUCCESS};
use std::collections::HashMap;
use std::path::Path;
use wrought_core::{DeploySpec, Engine};
use wrought_schema::METADATA_MARKER;

pub fn run(
    session: &mut Session,
    excludes: &[String],
    args_file: Option<&Path>,
    only: Option<&str>,
) -> Result<u8, String> {
    let overrides = load_overrides(args_file)?;

    let mut engine = Engine::new(
        &mut session.manifest,
        session.backend.as_ref(),
        &session.store,
        session.engine_config.clone(),
    );

    match only {
        Some(name) => {
            let spec = overrides.get(name).cloned().unwrap_or_default();
            let deployed = engine
                .deploy_manifest(name, &spec)
                .map_err(|e| e.to_string())?;
            if deployed.is_none() {
                println!("{} {name}: skipped", console::style("-").yellow());
            }
        }
        None => engine
            .deploy_all(excludes, &overrides)
            .map_err(|e| e.to_string())?,
    }

    let deployed = session
        .manifest
        .contracts
        .iter()
        .filter(|(name, entry)| !name.starts_with(METADATA_MARKER) && entry.is_deployed())
        .count();
    let total = session
        .manifest
        .contracts
        .keys()
        .filter(|name| !name.starts_with(METADATA_MARKER))
        .count();
    println!(
        "{} {deployed}/{total} contracts deployed",
        console::style("✓").green()
    );
    Ok(EXIT_SUCCESS)
}

fn load_overrides(path: Option<&Path>) -> Result<HashMap<String, DeploySpec>, String> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read args file {}: {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("invalid args file {}: {e}", path.display()))
}
