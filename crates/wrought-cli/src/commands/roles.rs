use super::{Session, EXIT_SUCCESS};
use wrought_core::Engine;

pub fn run(session: &mut Session) -> Result<u8, String> {
    let blocks = session.manifest.roles.len();

    let mut engine = Engine::new(
        &mut session.manifest,
        session.backend.as_ref(),
        &session.store,
        session.engine_config.clone(),
    );
    engine.grant_roles().map_err(|e| e.to_string())?;

    println!(
        "{} roles reconciled for {blocks} contract(s)",
        console::style("✓").green()
    );
    Ok(EXIT_SUCCESS)
}
