//! Error types for reseed

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for reseed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Filesystem operation that failed while preparing the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    /// Listing a directory
    ReadDir,
    /// Copying a file, link or directory tree
    Copy,
    /// Removing a file or directory tree
    Remove,
    /// Creating a directory
    CreateDir,
    /// Creating the scratch directory
    CreateTemp,
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsOp::ReadDir => "read directory",
            FsOp::Copy => "copy",
            FsOp::Remove => "remove",
            FsOp::CreateDir => "create directory",
            FsOp::CreateTemp => "create temporary directory",
        };
        f.write_str(name)
    }
}

/// Error type for reseed operations
#[derive(Error, Debug)]
pub enum Error {
    /// One or more required parameters are missing or empty
    #[error("Missing required parameters: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    /// A parameter is present but cannot be used
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// An external version-control command failed
    #[error("{step} failed ({program}): {detail}")]
    Command {
        step: String,
        program: String,
        detail: String,
    },

    /// A filesystem operation failed
    #[error("failed to {op} {}: {source}", .path.display())]
    Filesystem {
        op: FsOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The parameter input could not be read or parsed
    #[error("Failed to read parameters: {0}")]
    InputParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Repository inspection error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

impl Error {
    /// Build a filesystem error for `op` on `path`
    pub fn fs(op: FsOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }
}
