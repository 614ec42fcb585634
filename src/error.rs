//! Error handling for the trajectory-analysis library.
//!
//! A single typed error enum covers the failure classes of the pipeline:
//! IO, malformed tabular input, configuration, and external-tool failures.
//! Per-record parse problems are absorbed and tallied by the ingestion code;
//! everything that reaches a `TrajanError` aborts the run.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error enum for the trajectory-analysis library.
#[derive(Error, Debug)]
pub enum TrajanError {
    /// IO error carrying the offending path.
    #[error("IO error: {message} (path: {path})")]
    Io { message: String, path: PathBuf },

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding error (ICD9 to ICD10 mapping file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (bad thread count, unknown filter token, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A persisted RR file refers to a diagnosis name that is not in the
    /// current dictionary.
    #[error("unknown diagnosis name in RR file: {0}")]
    UnknownDiagnosis(String),

    /// External clustering tool failed.
    #[error("clustering tool failed: {0}")]
    External(String),
}

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, TrajanError>;

impl TrajanError {
    /// Create an IO error from a source error and the path it concerns.
    pub fn io(err: io::Error, path: impl AsRef<Path>) -> Self {
        Self::Io {
            message: err.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Extension trait that attaches a path to `io::Result` values.
pub trait IoResultExt<T> {
    /// Convert an `io::Result` into a library result, recording the path.
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| TrajanError::io(e, path))
    }
}
