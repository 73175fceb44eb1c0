use super::EXIT_SUCCESS;
use console::Style;
use std::path::Path;
use wrought_schema::{ContractEntry, METADATA_MARKER};
use wrought_store::ManifestStore;

pub fn run(manifest_path: &Path) -> Result<u8, String> {
    let store = ManifestStore::new(manifest_path);
    let manifest = store.load().map_err(|e| e.to_string())?;

    let deployed_style = Style::new().green();
    let pending_style = Style::new().yellow();

    let mut deployed = 0usize;
    let mut total = 0usize;
    for (name, entry) in &manifest.contracts {
        if name.starts_with(METADATA_MARKER) {
            continue;
        }
        total += 1;
        match entry {
            ContractEntry::Simple(address) => {
                if entry.is_deployed() {
                    deployed += 1;
                    println!("{name:<28} {} {address}", deployed_style.apply_to("deployed"));
                } else {
                    println!("{name:<28} {}", pending_style.apply_to("pending"));
                }
            }
            ContractEntry::Proxied(proxy) => {
                if proxy.has_proxy() {
                    deployed += 1;
                    let implementation = if proxy.has_implementation() {
                        proxy.implementation.as_str()
                    } else {
                        "?"
                    };
                    println!(
                        "{name:<28} {} proxy {} impl {implementation}",
                        deployed_style.apply_to("deployed"),
                        proxy.proxy
                    );
                } else {
                    println!("{name:<28} {} (proxy)", pending_style.apply_to("pending"));
                }
            }
        }
    }

    println!(
        "\n{deployed}/{total} contracts deployed, {} role block(s), {} config key(s)",
        manifest.roles.len(),
        manifest.config.len()
    );
    Ok(EXIT_SUCCESS)
}
