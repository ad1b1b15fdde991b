//! Configuration Loader
//!
//! Layers defaults, an optional TOML file and `PRESAMPLES_*` environment
//! variables with the `config` crate, then validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::PresamplesConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "PRESAMPLES";

impl PresamplesConfig {
    /// Load configuration from an optional TOML file and the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_from_sources(path, None)
    }

    /// Load configuration with an explicit environment map instead of the process environment.
    ///
    /// Keys are full variable names such as `PRESAMPLES_SEED`. This is useful for
    /// testing without modifying global environment variables.
    pub fn load_from_sources(
        path: Option<&Path>,
        environment: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let defaults =
            Config::try_from(&PresamplesConfig::default()).map_err(ConfigurationError::source_error)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigurationError::config_file_not_found(path));
            }
            debug!(path = %path.display(), "Loading presamples configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(environment),
        );

        let merged = builder.build().map_err(ConfigurationError::source_error)?;
        let config: PresamplesConfig = merged
            .try_deserialize()
            .map_err(|e| ConfigurationError::type_mismatch("presamples", e))?;

        config.validate()?;

        debug!(
            seed = ?config.seed,
            verify_checksums = config.verify_checksums,
            log_level = %config.log_level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}
