//! Configuration Error Types
//!
//! Errors raised while loading and validating [`PresamplesConfig`](super::PresamplesConfig).

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Explicitly requested configuration file does not exist
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    /// Configuration sources could not be read or merged
    #[error("Failed to build configuration from sources: {error}")]
    SourceError { error: String },

    /// Merged configuration does not match the expected structure
    #[error("Type mismatch for field {field}: {error}")]
    TypeMismatch { field: String, error: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    /// Create a configuration file not found error
    pub fn config_file_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::ConfigFileNotFound { path: path.into() }
    }

    /// Create a source error
    pub fn source_error<E: std::fmt::Display>(error: E) -> Self {
        Self::SourceError {
            error: error.to_string(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch<F: Into<String>, E: std::fmt::Display>(field: F, error: E) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            error: error.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
