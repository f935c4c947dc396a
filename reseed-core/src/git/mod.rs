//! Git operations for reseed
//!
//! Mutating operations go through the git executable ([`GitCli`]);
//! the rebuilt workspace is inspected with git2 ([`GitRepo`]).

mod cli;
mod repo;

pub use cli::{CommandOutput, GitCli, Vcs};
pub use repo::GitRepo;
