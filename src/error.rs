// SRF Engine - Error Types
//
// Structured error types for configuration, settings I/O and population access.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for spontaneous release operations.
///
/// Configuration and I/O failures surface here during the host's setup
/// phase. Numerical edge cases of sampling never reach this type; they are
/// clamped inside the sampler.
#[derive(Debug, Error)]
pub enum SrfError {
    /// Mode name did not match any known mode.
    #[error("Unknown SRF mode '{name}' (valid: {valid})")]
    UnknownMode { name: String, valid: String },

    /// Model name did not match any known model.
    #[error("Unknown SRF model '{name}' (valid: {valid})")]
    UnknownModel { name: String, valid: String },

    /// Parameter set is unknown, or not defined for the requested mode/model.
    #[error("Unknown parameter set '{name}' for {context} (valid: {valid})")]
    UnknownParameterSet {
        name: String,
        context: String,
        valid: String,
    },

    /// User-supplied coefficient list has the wrong length.
    #[error("User_control parameter set expected {expected} coefficients, got {actual}")]
    CoefficientCount { expected: usize, actual: usize },

    /// A coefficient is non-finite or outside its admissible range.
    #[error("Invalid coefficient {name} = {value}: {reason}")]
    InvalidCoefficient {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Settings or configuration file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings line could not be parsed.
    #[error("Settings parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Configuration decoding or cross-field validation failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cell index is not part of the population.
    #[error("Unknown cell: {cell}")]
    UnknownCell { cell: usize },
}

impl SrfError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SrfError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
