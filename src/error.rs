//! Error types for the accuracy engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, AccuracyError>;

/// Errors that can occur while configuring or running an evaluation.
#[derive(Error, Debug)]
pub enum AccuracyError {
    /// A field was configured with a negative (or non-finite) weight.
    #[error("Field '{field}' has invalid weight {weight}: weights must be non-negative")]
    NegativeWeight { field: String, weight: f64 },

    /// A field result violates the score/weight invariants.
    #[error("Invalid result for field '{field}': {reason}")]
    InvalidFieldResult { field: String, reason: String },

    /// A calculator kind name that was never registered.
    #[error("Unknown calculator kind: {0}")]
    UnknownCalculatorKind(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A case file that does not hold an expected/actual pair.
    #[error("Invalid case file '{path}': {reason}")]
    InvalidCase { path: PathBuf, reason: String },

    /// Logging could not be initialised.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl AccuracyError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_result(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFieldResult {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AccuracyError {
    fn from(err: serde_json::Error) -> Self {
        AccuracyError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AccuracyError {
    fn from(err: serde_yaml::Error) -> Self {
        AccuracyError::Config(err.to_string())
    }
}
