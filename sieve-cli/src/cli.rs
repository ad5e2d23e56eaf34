//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Sieve -- rule-driven message pipeline interpreter.
///
/// Use `sieve <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "sieve", version, about, long_about = None)]
pub struct Cli {
    /// Path to the sieve.toml configuration file.
    #[arg(short, long, default_value = "sieve.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run messages through the configured pipelines and print the result.
    Simulate(SimulateArgs),

    /// Check rule, pipeline and connection definitions.
    Validate(ValidateArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- simulate ----

/// Feed JSON-lines messages through the interpreter.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// JSON-lines input file, one message object per line ("-" for stdin).
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Definition directory (overrides `store.config_dir`).
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Run only these pipelines, once, ignoring stream connections.
    #[arg(short, long = "pipeline")]
    pub pipelines: Vec<String>,

    /// Streams for input lines that carry no `streams` array.
    #[arg(short, long = "stream", default_value = "default")]
    pub streams: Vec<String>,

    /// Record rule metrics and print a Prometheus snapshot after the run.
    #[arg(long)]
    pub metrics: bool,
}

// ---- validate ----

/// Load and compile every definition without processing messages.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Definition directory (overrides `store.config_dir`).
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

// ---- config ----

/// Manage sieve configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, interpreter, store).
        #[arg(long)]
        section: Option<String>,
    },
}
