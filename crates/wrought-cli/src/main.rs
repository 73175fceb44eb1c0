mod commands;
mod network;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_BACKEND_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "wrought",
    version,
    about = "Declarative deployment engine for upgradeable smart contracts"
)]
struct Cli {
    /// Path to the deployment manifest JSON.
    #[arg(long, default_value = "deploy.json", global = true)]
    manifest: PathBuf,

    /// Chain backend to drive.
    #[arg(long, default_value = "mock", global = true)]
    backend: String,

    /// Manifest entry acting as the proxy admin contract.
    #[arg(long, default_value = "ProxyAdmin", global = true)]
    proxy_admin: String,

    /// Manifest entry naming the proxy contract artifact.
    #[arg(long, default_value = "UpgradeProxy", global = true)]
    proxy: String,

    /// Directory of per-network JSON configuration files.
    #[arg(long, global = true)]
    networks: Option<PathBuf>,

    /// Network to run against (looked up in --networks).
    #[arg(long, global = true)]
    network: Option<String>,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile manifest entries against the chain, in document order.
    Deploy {
        /// Manifest entries to leave untouched.
        #[arg(long)]
        exclude: Vec<String>,
        /// JSON file of per-contract implArgs/initArgs/libs overrides.
        #[arg(long)]
        args_file: Option<PathBuf>,
        /// Deploy a single entry instead of the whole manifest.
        #[arg(long)]
        only: Option<String>,
    },
    /// Reconcile access-control role membership.
    Roles,
    /// Reconcile runtime configuration values.
    Config {
        /// Contract to reconcile; every deployed contract when omitted.
        contract: Option<String>,
        /// Compact grammar entries ("key[/getter][/setter]") overriding
        /// auto-discovery. Requires a contract name.
        #[arg(long = "spec")]
        specs: Vec<String>,
    },
    /// Summarize the manifest's deployment state.
    Status,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WROUGHT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("manifest file not found")
                || msg.starts_with("failed to parse manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("backend error:") || msg.starts_with("backend '") {
                EXIT_BACKEND_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> Result<u8, String> {
    if let Some(dir) = &cli.networks {
        let networks = network::load_networks(dir)?;
        if let Some(name) = &cli.network {
            let net = networks
                .get(name)
                .ok_or_else(|| format!("unknown network '{name}'"))?;
            let chain_id = net
                .chain_id
                .map_or_else(|| "?".to_owned(), |id| id.to_string());
            println!(
                "network {} (chain {chain_id}) via {}",
                console::style(&net.name).cyan(),
                net.url
            );
        }
    }

    match &cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::Status => commands::status::run(&cli.manifest),
        Commands::Deploy {
            exclude,
            args_file,
            only,
        } => {
            let mut session = commands::open_session(
                &cli.manifest,
                &cli.backend,
                &cli.proxy_admin,
                &cli.proxy,
            )?;
            commands::deploy::run(&mut session, exclude, args_file.as_deref(), only.as_deref())
        }
        Commands::Roles => {
            let mut session = commands::open_session(
                &cli.manifest,
                &cli.backend,
                &cli.proxy_admin,
                &cli.proxy,
            )?;
            commands::roles::run(&mut session)
        }
        Commands::Config { contract, specs } => {
            let mut session = commands::open_session(
                &cli.manifest,
                &cli.backend,
                &cli.proxy_admin,
                &cli.proxy,
            )?;
            commands::config::run(&mut session, contract.as_deref(), specs)
        }
    }
}
