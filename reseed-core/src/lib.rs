//! Reseed Core - Core library for one-shot repository migration
//!
//! This crate clones a source repository, optionally promotes one of its
//! subdirectories to the root, discards the history and publishes the
//! result as a single fresh commit on a destination remote.

pub mod config;
pub mod error;
pub mod git;
pub mod migrate;
pub mod request;
pub mod result;
pub mod transport;
pub mod workspace;

pub use config::{Config, GitConfig, MigrationConfig};
pub use error::{Error, FsOp, Result};
pub use git::{CommandOutput, GitCli, GitRepo, Vcs};
pub use migrate::{MigrationOptions, Migrator, Step, StepFailure, INITIAL_COMMIT_MESSAGE};
pub use request::{MigrationRequest, RequestParams};
pub use result::MigrationResult;
pub use transport::Transport;
