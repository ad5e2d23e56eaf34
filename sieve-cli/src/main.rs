//! Sieve CLI -- run and inspect rule-driven message pipelines
//!
//! # Commands
//!
//! - `simulate`: feed JSON-lines messages through the configured pipelines
//! - `validate`: check rule, pipeline and connection definitions
//! - `config`: validate or show `sieve.toml`

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use sieve_core::config::{GeneralConfig, SieveConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it loads; a broken file
    // is reported by the command itself.
    let general = SieveConfig::load(&cli.config)
        .await
        .map(|config| config.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    let log_level = cli.log_level.as_deref().unwrap_or(&general.log_level);
    if let Err(e) = logging::init_tracing(log_level, &general.log_format) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Simulate(args) => commands::simulate::execute(args, &cli.config, &writer).await,
        Commands::Validate(args) => commands::validate::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
