//! CLI-specific error types and exit code mapping

use sieve_core::error::SieveError;
use sieve_pipeline::PipelineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A line of simulation input could not be turned into a message.
    #[error("input error at line {line}: {reason}")]
    Input { line: usize, reason: String },

    /// Definition validation found errors.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Pipeline domain error (definition loading, state updater, interpreter).
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from sieve-core.
    #[error("{0}")]
    Core(#[from] SieveError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 0    | Success                        |
    /// | 1    | General / command error        |
    /// | 2    | Configuration error            |
    /// | 3    | Definition validation failed   |
    /// | 4    | Malformed simulation input     |
    /// | 10   | IO error                       |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(SieveError::Config(_)) => 2,
            Self::Validation(_) => 3,
            Self::Input { .. } => 4,
            Self::Io(_) => 10,
            Self::Command(_) | Self::Pipeline(_) | Self::JsonSerialize(_) | Self::Core(_) => 1,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config { .. } => Self::Config(e.to_string()),
            other => Self::Pipeline(other.to_string()),
        }
    }
}
