//! Tidepool CLI
//!
//! Replays stake pool scenarios against an in-memory custody.

mod script;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidepool_core::{LogFormat, LoggingConfig, PoolConfig, SCALE};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::script::{Report, Script, DEMO_SCRIPT};

#[derive(Parser)]
#[command(name = "tidepool")]
#[command(author = "Tidepool Contributors")]
#[command(version)]
#[command(about = "Tidepool - lazy proportional stake pool accounting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pool configuration file (TOML)
    #[arg(short, long, global = true, env = "TIDEPOOL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario script
    Simulate {
        /// Script path
        script: PathBuf,
    },

    /// Run the built-in walk-through
    Demo,

    /// Version information
    Version,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Events as JSON lines, then the ledger and every position
fn print_report(report: &Report) -> anyhow::Result<()> {
    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }
    println!();
    println!("ledger: {}", serde_json::to_string_pretty(&report.ledger)?);
    println!("vault balance: {}", report.vault_balance);
    for position in &report.positions {
        println!(
            "{:<12} stored {:>10}  settled {:>10}  reward {:>8}  burned {:>8}  wallet {:>10}",
            position.owner,
            position.stored_principal,
            position.preview.principal_after,
            position.preview.reward,
            position.preview.burned,
            position.wallet,
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Simulate { script } => {
            tracing::info!("Running scenario {:?}", script);
            let report = Script::load(&script)?.run(config)?;
            print_report(&report)?;
        }

        Commands::Demo => {
            let report = Script::from_toml_str(DEMO_SCRIPT)?.run(config)?;
            print_report(&report)?;
        }

        Commands::Version => {
            println!("tidepool {}", env!("CARGO_PKG_VERSION"));
            println!("Ratio scale: {}", SCALE);
        }
    }

    Ok(())
}
