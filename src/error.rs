//! Error types for presamples package loading and matrix updates.

use crate::config::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresamplesError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid npy data in '{path}': {reason}")]
    Npy { path: PathBuf, reason: String },
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Invalid presamples package at '{path}': {reason}")]
    InvalidPackage { path: PathBuf, reason: String },
    #[error("Checksum mismatch for '{path}': expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("Conflicting matrices in resource group '{group}': {matrices:?}")]
    ConflictingMatrices { group: String, matrices: Vec<String> },
    #[error("Conflicting {axis} labels in resource group '{group}'")]
    ConflictingLabels { group: String, axis: &'static str },
    #[error("Incompatible index arrays in resource group '{group}'")]
    IncompatibleIndices { group: String },
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Index ({row}, {col}) out of bounds for matrix '{matrix}' with shape {shape:?}")]
    IndexOutOfBounds {
        matrix: String,
        row: i64,
        col: i64,
        shape: (usize, usize),
    },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl PresamplesError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn npy(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Npy {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_package(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPackage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PresamplesError {
    fn from(error: serde_json::Error) -> Self {
        PresamplesError::Json(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PresamplesError>;
