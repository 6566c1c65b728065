mod config;
mod telemetry;

use bootstrap::auth::InMemoryUserStore;
use bootstrap::errors::BootstrapError;
use clap::{Args, Parser};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::telemetry::TelemetryError;

#[derive(Parser)]
enum CliCommand {
    /// Serve page bootstraps and health probes
    Serve(ConfigArgs),
    /// Load and validate a config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::Serve(args) => serve(args),
        CliCommand::CheckConfig(args) => check_config(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn check_config(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    config
        .bootstrap
        .validate()
        .map_err(BootstrapError::from)?;
    println!("{}: ok", args.config.display());
    Ok(())
}

fn serve(args: ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    let _sentry = telemetry::init(&config.common)?;

    let users: InMemoryUserStore = config.bootstrap.users.iter().cloned().collect();
    tracing::info!(
        mode = config.bootstrap.mode.as_str(),
        users = users.len(),
        "Starting notes"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if let Err(e) = rt.block_on(bootstrap::run(config.bootstrap, Arc::new(users))) {
        tracing::error!(error = %e, "Server stopped");
        return Err(e.into());
    }
    Ok(())
}
