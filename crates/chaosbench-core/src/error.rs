//! Error taxonomy for the harness.
//!
//! Numeric guards and threshold violations are never errors: guards are
//! resolved locally with floor values and threshold outcomes flow into
//! [`crate::report::ExitStatus`]. Only I/O, serialization, configuration and
//! process-spawn failures surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Canonical error type for chaosbench.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A configuration file was present but unusable.
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// The external validator could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;
