//! Error handling for mac-setup
//!
//! Recognition mismatches (unterminated marker blocks, missing assignments,
//! no bootstrap signature) are never errors: they surface as `false`/`None`.
//! Everything in here aborts the current operation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mac-setup
#[derive(Error, Debug)]
pub enum SetupError {
    /// IO errors not tied to a specific managed file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing the managed shell config failed
    #[error("Failed to update {path:?}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot creation or pointer update failed
    #[error("Backup of {path:?} failed: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A foundational external command failed
    #[error("Command failed: {0}")]
    Command(String),

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The host is not a supported macOS machine
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Result type alias for mac-setup operations
pub type Result<T> = std::result::Result<T, SetupError>;

impl SetupError {
    /// Create a command failure error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn document(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Document {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn backup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }
}
