use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use credex::{run_scenario, CredexConfig, RootError};

/// Credex: anonymous credentials with ledger-anchored revocation
#[derive(Parser, Debug)]
#[command(name = "credex", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Data directory for credex state
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Issue, present, revoke and present again on an in-memory ledger
    Scenario {
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool, configured: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("credex=debug,credex_cred=debug,credex_proof=debug,credex_ledger=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<CredexConfig, RootError> {
    match path {
        Some(p) => CredexConfig::load(p),
        None => CredexConfig::load(&CredexConfig::default_config_path()),
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("credex: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose, &config.log.filter);

    if let Err(e) = run(cli, config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: CredexConfig) -> Result<(), RootError> {
    match cli.command {
        Commands::Init { data_dir } => cmd_init(cli.config.as_ref(), config, data_dir),
        Commands::Scenario { json } => cmd_scenario(&config, json),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    mut config: CredexConfig,
    data_dir: Option<PathBuf>,
) -> Result<(), RootError> {
    if let Some(dd) = data_dir {
        config.data_dir = dd;
    }
    config.validate()?;

    info!("initializing credex");
    std::fs::create_dir_all(&config.data_dir)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(CredexConfig::default_config_path);
    config.save(&save_path)?;

    println!("Credex initialized successfully.");
    println!("  Data dir:   {}", config.data_dir.display());
    println!("  Store:      {:?}", config.store.backend);
    println!("  Config:     {}", save_path.display());

    Ok(())
}

fn cmd_scenario(config: &CredexConfig, json: bool) -> Result<(), RootError> {
    let report = run_scenario(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let outcome = |ok: bool| if ok { "verified" } else { "rejected" };
    println!("Scenario:");
    println!(
        "  Revealed name:      {}",
        report.revealed_name.as_deref().unwrap_or("-")
    );
    println!("  Before revocation:  {}", outcome(report.before_revocation));
    println!("  After revocation:   {}", outcome(report.after_revocation));

    Ok(())
}
