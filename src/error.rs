use std::path::PathBuf;

use thiserror::Error;

use crate::problem::ProblemState;

/// Configuration errors, raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid horizon grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("Problem must be in the Configured state to change tuning (current: {0:?})")]
    NotConfigured(ProblemState),

    #[error("Measurements cannot be updated while solving")]
    Busy,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Reasons a reference trajectory could not be recovered after a solve.
///
/// All of them are recoverable: the extractor substitutes a flat set point.
#[derive(Debug, Error)]
pub enum ArtifactUnavailable {
    #[error("No solver output has been produced")]
    NotProduced,

    #[error("Failed to read result artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed result artifact: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Result artifact has no reference series for `{0}`")]
    MissingKey(String),

    #[error("Reference series length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Result artifact `{0}` series does not match the current problem")]
    Stale(String),
}
