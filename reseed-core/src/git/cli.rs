//! Version-control operations driven through the git executable

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::config::GitConfig;
use crate::{Error, Result};

/// Captured output of a successful version-control call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The version-control operations a migration needs
///
/// Every method either succeeds with the captured output or fails with
/// [`Error::Command`] carrying the diagnostic text.
pub trait Vcs {
    /// Clone `url` into `dest`
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<CommandOutput>;

    /// Switch the working copy at `dir` to `branch`
    fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandOutput>;

    /// Create an empty repository rooted at `dir`
    fn init(&self, dir: &Path) -> Result<CommandOutput>;

    /// Set a repository-local config value
    fn set_config(&self, dir: &Path, key: &str, value: &str) -> Result<CommandOutput>;

    /// Register a remote
    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<CommandOutput>;

    /// Stage every file in the working tree
    fn stage_all(&self, dir: &Path) -> Result<CommandOutput>;

    /// Commit the staged files
    fn commit(&self, dir: &Path, message: &str) -> Result<CommandOutput>;

    /// Rename the current branch, overwriting any branch of that name
    fn rename_branch(&self, dir: &Path, name: &str) -> Result<CommandOutput>;

    /// Whether `remote` has a branch called `branch`
    fn remote_has_branch(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool>;

    /// Fetch `branch` from `remote` and replay local commits on top of it
    fn pull_rebase(&self, dir: &Path, remote: &str, branch: &str) -> Result<CommandOutput>;

    /// Push `branch` to `remote`
    fn push(
        &self,
        dir: &Path,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<CommandOutput>;
}

/// [`Vcs`] implementation that runs the git executable
///
/// Arguments are always passed as a vector, never through a shell.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    envs: Vec<(String, String)>,
}

impl GitCli {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            // Credential prompts would block a non-interactive run forever
            envs: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
        }
    }

    /// Build from the `[git]` config section
    pub fn from_config(config: &GitConfig) -> Self {
        let mut cli = Self::new().with_program(&config.program);
        if let Some(ref name) = config.author_name {
            cli = cli.with_author_name(name);
        }
        if let Some(ref email) = config.author_email {
            cli = cli.with_author_email(email);
        }
        cli
    }

    /// Use a specific git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Author and commit as `name`
    pub fn with_author_name(self, name: &str) -> Self {
        self.with_env("GIT_AUTHOR_NAME", name)
            .with_env("GIT_COMMITTER_NAME", name)
    }

    /// Author and commit as `email`
    pub fn with_author_email(self, email: &str) -> Self {
        self.with_env("GIT_AUTHOR_EMAIL", email)
            .with_env("GIT_COMMITTER_EMAIL", email)
    }

    fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Check if the git executable can be run
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run git and return its exit status, whatever it is
    fn exec<I, S>(
        &self,
        step: &str,
        dir: Option<&Path>,
        args: I,
    ) -> Result<(ExitStatus, CommandOutput)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command_line = std::iter::once(self.program.clone())
            .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(step, command = %command_line, cwd = ?dir, "Running");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            let detail = if e.kind() == std::io::ErrorKind::NotFound {
                format!("git executable not found at '{}'", self.program)
            } else {
                format!("failed to run {}: {}", command_line, e)
            };
            tracing::error!(step, "{}", detail);
            Error::Command {
                step: step.to_string(),
                program: self.program.clone(),
                detail,
            }
        })?;

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        Ok((output.status, captured))
    }

    /// Run git and fail on a non-zero exit
    fn run<I, S>(&self, step: &str, dir: Option<&Path>, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (status, output) = self.exec(step, dir, args)?;

        if status.success() {
            tracing::debug!(
                step,
                stdout = %output.stdout.trim_end(),
                stderr = %output.stderr.trim_end(),
                "Command succeeded"
            );
            return Ok(output);
        }

        tracing::error!(
            step,
            %status,
            stdout = %output.stdout.trim_end(),
            stderr = %output.stderr.trim_end(),
            "Command failed"
        );

        Err(Error::Command {
            step: step.to_string(),
            program: self.program.clone(),
            detail: failure_detail(status, &output),
        })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

fn failure_detail(status: ExitStatus, output: &CommandOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };

    if text.is_empty() {
        format!("exited with {}", status)
    } else {
        format!("exited with {}: {}", status, text)
    }
}

impl Vcs for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<CommandOutput> {
        self.run(
            "clone",
            None,
            [OsStr::new("clone"), OsStr::new("--"), OsStr::new(url), dest.as_os_str()],
        )
    }

    fn checkout(&self, dir: &Path, branch: &str) -> Result<CommandOutput> {
        // Trailing "--" keeps a branch that matches a file name from
        // being read as a path
        self.run("checkout", Some(dir), ["checkout", branch, "--"])
    }

    fn init(&self, dir: &Path) -> Result<CommandOutput> {
        self.run("init", Some(dir), ["init"])
    }

    fn set_config(&self, dir: &Path, key: &str, value: &str) -> Result<CommandOutput> {
        self.run("config", Some(dir), ["config", key, value])
    }

    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<CommandOutput> {
        self.run("remote", Some(dir), ["remote", "add", "--", name, url])
    }

    fn stage_all(&self, dir: &Path) -> Result<CommandOutput> {
        self.run("add", Some(dir), ["add", "--all"])
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<CommandOutput> {
        self.run("commit", Some(dir), ["commit", "-m", message])
    }

    fn rename_branch(&self, dir: &Path, name: &str) -> Result<CommandOutput> {
        self.run("branch", Some(dir), ["branch", "-M", name])
    }

    fn remote_has_branch(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{}", branch);
        let (status, output) = self.exec(
            "ls-remote",
            Some(dir),
            ["ls-remote", "--exit-code", "--heads", remote, refname.as_str()],
        )?;

        match status.code() {
            Some(0) => Ok(true),
            // --exit-code: no matching refs
            Some(2) => Ok(false),
            _ => {
                tracing::error!(
                    step = "ls-remote",
                    %status,
                    stderr = %output.stderr.trim_end(),
                    "Command failed"
                );
                Err(Error::Command {
                    step: "ls-remote".to_string(),
                    program: self.program.clone(),
                    detail: failure_detail(status, &output),
                })
            }
        }
    }

    fn pull_rebase(&self, dir: &Path, remote: &str, branch: &str) -> Result<CommandOutput> {
        self.run("pull", Some(dir), ["pull", "--rebase", remote, branch])
    }

    fn push(
        &self,
        dir: &Path,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<CommandOutput> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.extend([remote, branch]);
        self.run("push", Some(dir), args)
    }
}
