//! # Presamples Configuration
//!
//! Settings that control how presamples packages are loaded and how the crate logs.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `PRESAMPLES_*` environment variables (for example `PRESAMPLES_SEED=42` or
//! `PRESAMPLES_VERIFY_CHECKSUMS=false`).
//!
//! ```rust,no_run
//! use presamples::config::PresamplesConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PresamplesConfig::load(Some("presamples.toml".as_ref()))?;
//! println!("verify checksums: {}", config.verify_checksums);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::package::Seed;
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};

/// Upper bound accepted for `max_metadata_bytes` (256MB)
const METADATA_LIMIT_CEILING: u64 = 256 * 1024 * 1024;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PresamplesConfig {
    /// Overrides the seed stored in every loaded package: an integer or `"sequential"`
    pub seed: Option<Seed>,

    /// Compare file MD5 digests against `datapackage.json` on load
    pub verify_checksums: bool,

    /// Largest `datapackage.json` the loader will read
    pub max_metadata_bytes: u64,

    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for PresamplesConfig {
    fn default() -> Self {
        Self {
            seed: None,
            verify_checksums: true,
            max_metadata_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl PresamplesConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_metadata_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_metadata_bytes",
                "0",
                "metadata size limit must be greater than 0",
            ));
        }

        if self.max_metadata_bytes > METADATA_LIMIT_CEILING {
            return Err(ConfigurationError::invalid_value(
                "max_metadata_bytes",
                self.max_metadata_bytes.to_string(),
                format!("metadata size limit cannot exceed {METADATA_LIMIT_CEILING} bytes"),
            ));
        }

        if self.log_level.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "log_level",
                "",
                "log level must not be empty",
            ));
        }

        Ok(())
    }
}
