//! # Structured Logging Module
//!
//! Installs a `tracing` subscriber configured from [`PresamplesConfig`].
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::{LogFormat, PresamplesConfig};
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_logging(config: &PresamplesConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

        let layer = match config.log_format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_filter(filter)
                .boxed(),
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            log_level = %config.log_level,
            log_format = ?config.log_format,
            "Structured logging initialized"
        );
    });
}

/// Log one loader operation on a package
pub fn log_package_operation(operation: &str, package_id: &str, dirpath: &Path, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        package_id = %package_id,
        dirpath = %dirpath.display(),
        details = details,
        "PACKAGE_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = PresamplesConfig::default();
        init_logging(&config);
        init_logging(&config);
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
