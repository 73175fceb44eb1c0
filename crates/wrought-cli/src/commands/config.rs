use super::{Session, EXIT_FAILURE, EXIT_SUCCESS};
use wrought_core::{ConfigSpec, CoreError, Engine};
use wrought_schema::METADATA_MARKER;

pub fn run(
    session: &mut Session,
    contract: Option<&str>,
    specs: &[String],
) -> Result<u8, String> {
    let spec = if specs.is_empty() {
        ConfigSpec::Auto
    } else {
        ConfigSpec::Compact(specs.to_vec())
    };

    let targets: Vec<String> = match contract {
        Some(name) => vec![name.to_owned()],
        None => {
            if !specs.is_empty() {
                return Err("--spec requires a contract name".to_owned());
            }
            session
                .manifest
                .contracts
                .iter()
                .filter(|(name, entry)| {
                    !name.starts_with(METADATA_MARKER) && entry.is_deployed()
                })
                .map(|(name, _)| name.clone())
                .collect()
        }
    };

    let mut engine = Engine::new(
        &mut session.manifest,
        session.backend.as_ref(),
        &session.store,
        session.engine_config.clone(),
    );

    let mut failures = 0u32;
    for name in &targets {
        match engine.update_contract_config(name, &spec) {
            Ok(()) => {}
            // malformed grammar is fatal for the contract, not the batch
            Err(e @ CoreError::ConfigGrammar { .. }) => {
                eprintln!("{} {name}: {e}", console::style("✗").red());
                failures += 1;
            }
            Err(e) => return Err(e.to_string()),
        }
    }

    if failures == 0 {
        println!(
            "{} config reconciled for {} contract(s)",
            console::style("✓").green(),
            targets.len()
        );
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILURE)
    }
}
