//! Configuration management for reseed
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (RESEED_*)
//! 3. Config file (~/.config/reseed/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Settings for the git executable
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub program: String,

    /// Author and committer name for the new commit
    pub author_name: Option<String>,

    /// Author and committer email for the new commit
    pub author_email: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            author_name: None, // Fall back to git's own user.name
            author_email: None,
        }
    }
}

/// Defaults applied to every migration run
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Pull and rebase onto the destination branch before pushing,
    /// unless the request says otherwise
    pub sync_before_push: bool,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Git executable configuration
    pub git: GitConfig,

    /// Migration defaults
    pub migration: MigrationConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/reseed/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reseed").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - RESEED_GIT_PATH: Path to git executable
    /// - RESEED_AUTHOR_NAME / RESEED_AUTHOR_EMAIL: Commit identity
    /// - RESEED_SYNC_BEFORE_PUSH: "true" or "false"
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(program) = lookup("RESEED_GIT_PATH") {
            self.git.program = program;
        }

        if let Some(name) = lookup("RESEED_AUTHOR_NAME") {
            self.git.author_name = Some(name);
        }

        if let Some(email) = lookup("RESEED_AUTHOR_EMAIL") {
            self.git.author_email = Some(email);
        }

        if let Some(sync) = lookup("RESEED_SYNC_BEFORE_PUSH") {
            self.migration.sync_before_push = parse_bool(&sync).ok_or_else(|| {
                Error::Config(format!(
                    "RESEED_SYNC_BEFORE_PUSH must be true or false, got '{}'",
                    sync
                ))
            })?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        git_path: Option<String>,
        sync_before_push: Option<bool>,
    ) -> Self {
        if let Some(path) = git_path {
            self.git.program = path;
        }

        if let Some(sync) = sync_before_push {
            self.migration.sync_before_push = sync;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        git_path: Option<String>,
        sync_before_push: Option<bool>,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(git_path, sync_before_push))
    }
}

/// Parse the loose boolean spellings accepted in parameters and env vars
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
