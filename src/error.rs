//! Error types for shelve.
//!
//! Library code returns [`Result`]; the command-line layer wraps these in
//! `color_eyre` reports.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shelve operations
pub type Result<T> = std::result::Result<T, ShelveError>;

#[derive(Error, Debug)]
pub enum ShelveError {
    /// Invalid or incomplete run configuration. Raised before any file is touched.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("No free destination name for {} after {attempts} attempts", path.display())]
    SuffixExhausted { path: PathBuf, attempts: u32 },

    #[error("Cannot read source directory {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
