//! Error types for FileSyncer

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for synchronization runs
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid directory path: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("Target directory has not enough free storage space! Required: {required} bytes, available: {available} bytes")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Failed to {action} {}: {source}", path.display())]
    Copy {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid argument: {reason}")]
    Argument { reason: String },
}

impl Error {
    pub(crate) fn copy(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Copy {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn argument(reason: impl Into<String>) -> Self {
        Self::Argument {
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a whole pass rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. } | Self::InsufficientSpace { .. } | Self::Argument { .. }
        )
    }
}

/// Result type alias for FileSyncer operations
pub type Result<T> = std::result::Result<T, Error>;
