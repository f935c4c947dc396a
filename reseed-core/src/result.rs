//! Migration outcome reported back to the caller

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::Result;

/// Message returned on success
pub const SUCCESS_MESSAGE: &str = "Repository setup completed successfully!";

/// Outcome of a migration run
///
/// Serializes to `{"success": true, "repo_dir", "default_branch", "message"}`
/// or `{"success": false, "error"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationResult {
    Success {
        repo_dir: String,
        default_branch: String,
        message: String,
    },
    Failure {
        error: String,
    },
}

impl MigrationResult {
    /// Successful result for a workspace and branch
    pub fn success(repo_dir: impl Into<String>, default_branch: impl Into<String>) -> Self {
        MigrationResult::Success {
            repo_dir: repo_dir.into(),
            default_branch: default_branch.into(),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    /// Failed result with a human-readable reason
    pub fn failure(error: impl Into<String>) -> Self {
        MigrationResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MigrationResult::Success { .. })
    }

    /// The failure reason, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            MigrationResult::Success { .. } => None,
            MigrationResult::Failure { error } => Some(error),
        }
    }

    /// Compact JSON, as written to stdout
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON, as written to result files
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for MigrationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MigrationResult::Success {
                repo_dir,
                default_branch,
                message,
            } => {
                let mut state = serializer.serialize_struct("MigrationResult", 4)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("repo_dir", repo_dir)?;
                state.serialize_field("default_branch", default_branch)?;
                state.serialize_field("message", message)?;
                state.end()
            }
            MigrationResult::Failure { error } => {
                let mut state = serializer.serialize_struct("MigrationResult", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}
