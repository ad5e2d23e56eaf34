//! Command handlers -- one module per subcommand

pub mod config;
pub mod simulate;
pub mod validate;

use std::path::{Path, PathBuf};

use tracing::debug;

use sieve_core::config::SieveConfig;
use sieve_core::error::{ConfigError, SieveError};

use crate::error::CliError;

/// Load `sieve.toml`, falling back to defaults (plus env overrides) when the
/// file does not exist.
///
/// Parse and validation errors are still reported.
pub(crate) async fn load_config(path: &Path) -> Result<SieveConfig, CliError> {
    match SieveConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(SieveError::Config(ConfigError::FileNotFound { .. })) => {
            debug!(path = %path.display(), "config file not found, using defaults");
            let mut config = SieveConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

/// Definition directory: the command-line override, else `store.config_dir`.
pub(crate) fn definition_dir(config: &SieveConfig, overridden: Option<PathBuf>) -> PathBuf {
    overridden.unwrap_or_else(|| PathBuf::from(&config.store.config_dir))
}
