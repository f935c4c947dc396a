//! Migration orchestrator
//!
//! Runs the fixed sequence clone, checkout, optional subtree promotion,
//! history strip, re-init, commit, optional sync and push. The first
//! failing step ends the run; every outcome comes back as a
//! [`MigrationResult`].

use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::git::{GitRepo, Vcs};
use crate::request::{MigrationRequest, RequestParams};
use crate::result::MigrationResult;
use crate::transport::Transport;
use crate::{workspace, Error};

/// Message of the single commit pushed to the destination
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit from source repository";

/// Name the destination remote is registered under
pub const REMOTE_NAME: &str = "origin";

/// Stages of a migration run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validating,
    CleaningWorkspace,
    Cloning,
    CheckingOut,
    ExtractingSubdir,
    StrippingHistory,
    Reinitializing,
    ConfiguringRemote,
    Committing,
    RenamingBranch,
    Syncing,
    Pushing,
    Succeeded,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Validating => "validate",
            Step::CleaningWorkspace => "clean-workspace",
            Step::Cloning => "clone",
            Step::CheckingOut => "checkout",
            Step::ExtractingSubdir => "extract-subdir",
            Step::StrippingHistory => "strip-history",
            Step::Reinitializing => "reinit",
            Step::ConfiguringRemote => "configure-remote",
            Step::Committing => "commit",
            Step::RenamingBranch => "rename-branch",
            Step::Syncing => "sync",
            Step::Pushing => "push",
            Step::Succeeded => "done",
        };
        f.write_str(label)
    }
}

/// A run stopped at `step`
#[derive(Debug)]
pub struct StepFailure {
    pub step: Step,
    /// Message reported to the caller
    pub reason: String,
    /// Underlying error, logged but not reported
    pub source: Option<Error>,
}

/// Map an error into a failure at `step` with a fixed caller-facing reason
fn fail(step: Step, reason: impl Into<String>) -> impl FnOnce(Error) -> StepFailure {
    let reason = reason.into();
    move |source| StepFailure {
        step,
        reason,
        source: Some(source),
    }
}

/// Run-wide switches not carried by the request
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Pull and rebase onto the destination branch before pushing,
    /// when the request does not say
    pub sync_before_push: bool,
}

impl From<&Config> for MigrationOptions {
    fn from(config: &Config) -> Self {
        Self {
            sync_before_push: config.migration.sync_before_push,
        }
    }
}

/// Sequences a migration against a [`Vcs`]
#[derive(Debug)]
pub struct Migrator<V> {
    vcs: V,
    options: MigrationOptions,
}

impl<V: Vcs> Migrator<V> {
    pub fn new(vcs: V, options: MigrationOptions) -> Self {
        Self { vcs, options }
    }

    /// The version-control backend in use
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Validate raw parameters, then run
    ///
    /// Validation failures never touch the filesystem.
    pub fn run_params(&self, params: RequestParams) -> MigrationResult {
        tracing::info!(step = %Step::Validating, "Validating parameters");
        match MigrationRequest::try_from(params) {
            Ok(request) => self.run(&request),
            Err(e) => {
                tracing::error!(step = %Step::Validating, "{}", e);
                MigrationResult::failure(e.to_string())
            }
        }
    }

    /// Run a validated request to completion or first failure
    pub fn run(&self, request: &MigrationRequest) -> MigrationResult {
        match self.execute(request) {
            Ok(()) => {
                tracing::info!(step = %Step::Succeeded, "Repository setup completed successfully!");
                MigrationResult::success(
                    request.repo_dir.display().to_string(),
                    &request.default_branch,
                )
            }
            Err(failure) => {
                match failure.source {
                    Some(ref source) => tracing::error!(
                        step = %failure.step,
                        error = %source,
                        "{}",
                        failure.reason
                    ),
                    None => tracing::error!(step = %failure.step, "{}", failure.reason),
                }
                MigrationResult::failure(failure.reason)
            }
        }
    }

    /// Execute every step, stopping at the first failure
    pub fn execute(&self, request: &MigrationRequest) -> Result<(), StepFailure> {
        let dir = request.repo_dir.as_path();
        let branch = request.default_branch.as_str();

        log_transport("source", &request.source_url, request.use_ssh_source);
        log_transport("destination", &request.destination_url, request.use_ssh_destination);

        tracing::info!(step = %Step::CleaningWorkspace, path = %dir.display(), "Preparing workspace");
        workspace::reset(dir).map_err(|e| StepFailure {
            step: Step::CleaningWorkspace,
            reason: format!("Failed to remove existing directory: {}", e),
            source: None,
        })?;

        tracing::info!(step = %Step::Cloning, "Cloning source repository from {}", request.source_url);
        self.vcs
            .clone_repo(&request.source_url, dir)
            .map_err(fail(Step::Cloning, "Failed to clone source repository"))?;

        tracing::info!(step = %Step::CheckingOut, "Checking out branch {}", request.branch);
        self.vcs.checkout(dir, &request.branch).map_err(fail(
            Step::CheckingOut,
            format!("Failed to checkout branch: {}", request.branch),
        ))?;

        if let Some(ref sub_dir) = request.sub_dir {
            self.extract_subdir(dir, sub_dir)?;
        }

        tracing::info!(step = %Step::StrippingHistory, "Removing source history");
        workspace::strip_history(dir).map_err(|e| StepFailure {
            step: Step::StrippingHistory,
            reason: format!("Failed to remove source history: {}", e),
            source: None,
        })?;

        tracing::info!(step = %Step::Reinitializing, "Initializing new Git repository");
        self.vcs
            .init(dir)
            .map_err(fail(Step::Reinitializing, "Failed to initialize new repository"))?;
        self.vcs
            .set_config(dir, "core.autocrlf", "false")
            .map_err(fail(Step::Reinitializing, "Failed to configure Git"))?;

        tracing::info!(
            step = %Step::ConfiguringRemote,
            "Configuring remote {} to {}",
            REMOTE_NAME,
            request.destination_url
        );
        self.vcs
            .add_remote(dir, REMOTE_NAME, &request.destination_url)
            .map_err(fail(Step::ConfiguringRemote, "Failed to add remote"))?;
        check_remote(dir, &request.destination_url);

        tracing::info!(step = %Step::Committing, "Committing files");
        self.vcs
            .stage_all(dir)
            .map_err(fail(Step::Committing, "Failed to add files to Git"))?;
        self.vcs
            .commit(dir, INITIAL_COMMIT_MESSAGE)
            .map_err(fail(Step::Committing, "Failed to commit files"))?;
        log_new_history(dir);

        tracing::info!(step = %Step::RenamingBranch, "Renaming branch to {}", branch);
        self.vcs.rename_branch(dir, branch).map_err(fail(
            Step::RenamingBranch,
            format!("Failed to create branch: {}", branch),
        ))?;
        check_branch(dir, branch);

        if request.sync_before_push.unwrap_or(self.options.sync_before_push) {
            self.sync(dir, branch)?;
        } else {
            tracing::debug!(step = %Step::Syncing, "Pre-push sync disabled");
        }

        tracing::info!(step = %Step::Pushing, "Pushing to default branch: {}", branch);
        self.vcs.push(dir, REMOTE_NAME, branch, true).map_err(fail(
            Step::Pushing,
            format!("Failed to push to remote branch: {}", branch),
        ))?;

        Ok(())
    }

    fn extract_subdir(&self, dir: &Path, sub_dir: &Path) -> Result<(), StepFailure> {
        let source = dir.join(sub_dir);
        if !source.is_dir() {
            tracing::warn!(
                step = %Step::ExtractingSubdir,
                sub_dir = %sub_dir.display(),
                "Subdirectory not found, keeping the full tree"
            );
            return Ok(());
        }

        tracing::info!(
            step = %Step::ExtractingSubdir,
            "Processing subdirectory: {}",
            sub_dir.display()
        );
        let promoted = workspace::extract_subtree(dir, sub_dir).map_err(|e| StepFailure {
            step: Step::ExtractingSubdir,
            reason: format!("Failed to process subdirectory: {}", e),
            source: None,
        })?;
        tracing::debug!(step = %Step::ExtractingSubdir, promoted, "Subdirectory promoted");

        Ok(())
    }

    fn sync(&self, dir: &Path, branch: &str) -> Result<(), StepFailure> {
        let reason = format!("Failed to pull remote changes for branch: {}", branch);

        let exists = self
            .vcs
            .remote_has_branch(dir, REMOTE_NAME, branch)
            .map_err(fail(Step::Syncing, reason.clone()))?;

        if !exists {
            tracing::info!(
                step = %Step::Syncing,
                "Remote has no branch {}, nothing to pull",
                branch
            );
            return Ok(());
        }

        tracing::info!(step = %Step::Syncing, "Pulling remote changes to avoid conflicts");
        self.vcs
            .pull_rebase(dir, REMOTE_NAME, branch)
            .map_err(fail(Step::Syncing, reason))?;

        Ok(())
    }
}

fn log_transport(role: &str, url: &str, use_ssh: bool) {
    let transport = Transport::detect(url);
    tracing::info!(
        %transport,
        "Using {} protocol for {} repository",
        Transport::label_for(use_ssh),
        role
    );
    if transport.contradicts(use_ssh) {
        tracing::warn!(
            %transport,
            use_ssh,
            "The {} URL does not look like {}",
            role,
            Transport::label_for(use_ssh)
        );
    }
}

/// Report the freshly created root commit
fn log_new_history(dir: &Path) {
    let inspected = GitRepo::open(dir).and_then(|repo| {
        let head = repo.head_commit()?;
        let count = repo.commit_count()?;
        Ok((head, count))
    });

    match inspected {
        Ok((head, 1)) => tracing::info!(step = %Step::Committing, commit = %head, "Created root commit"),
        Ok((head, count)) => tracing::warn!(
            step = %Step::Committing,
            commit = %head,
            count,
            "Expected a single commit after re-init"
        ),
        Err(e) => tracing::debug!(step = %Step::Committing, "Could not inspect new history: {}", e),
    }
}

/// Confirm the destination remote points where it was asked to
///
/// `None` when the workspace cannot be inspected.
fn check_remote(dir: &Path, expected: &str) -> Option<bool> {
    let url = match GitRepo::open(dir).and_then(|repo| repo.remote_url(REMOTE_NAME)) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(step = %Step::ConfiguringRemote, "Could not inspect remotes: {}", e);
            return None;
        }
    };

    let matches = url.as_deref() == Some(expected);
    if !matches {
        tracing::warn!(
            step = %Step::ConfiguringRemote,
            remote = REMOTE_NAME,
            found = ?url,
            expected,
            "Remote URL differs from the destination"
        );
    }
    Some(matches)
}

/// Confirm HEAD is on the renamed branch
fn check_branch(dir: &Path, expected: &str) -> Option<bool> {
    let current = match GitRepo::open(dir).and_then(|repo| repo.current_branch()) {
        Ok(current) => current,
        Err(e) => {
            tracing::debug!(step = %Step::RenamingBranch, "Could not inspect HEAD: {}", e);
            return None;
        }
    };

    let matches = current.as_deref() == Some(expected);
    if !matches {
        tracing::warn!(
            step = %Step::RenamingBranch,
            found = ?current,
            expected,
            "HEAD is not on the expected branch"
        );
    }
    Some(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::CommandOutput;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;

    /// Records calls and fails on request
    #[derive(Default)]
    struct FakeVcs {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
        remote_branch: bool,
    }

    impl FakeVcs {
        fn failing_on(op: &'static str) -> Self {
            Self {
                fail_on: Some(op),
                ..Default::default()
            }
        }

        fn record(&self, op: &'static str, detail: String) -> crate::Result<CommandOutput> {
            self.calls.borrow_mut().push(format!("{} {}", op, detail).trim().to_string());
            if self.fail_on == Some(op) {
                return Err(Error::Command {
                    step: op.to_string(),
                    program: "fake".to_string(),
                    detail: "boom".to_string(),
                });
            }
            Ok(CommandOutput::default())
        }

        fn ops(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.split(' ').next().unwrap_or_default().to_string())
                .collect()
        }
    }

    impl Vcs for FakeVcs {
        fn clone_repo(&self, url: &str, dest: &Path) -> crate::Result<CommandOutput> {
            let out = self.record("clone", url.to_string())?;
            // Lay down a source tree the way git clone would
            for (path, body) in [
                (".git/HEAD", "ref: refs/heads/main\n"),
                ("README.md", "top"),
                ("packages/core/a.txt", "a"),
                ("packages/core/b.txt", "b"),
                ("packages/web/index.html", "<html>"),
            ] {
                let full = dest.join(path);
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(full, body).unwrap();
            }
            Ok(out)
        }

        fn checkout(&self, _dir: &Path, branch: &str) -> crate::Result<CommandOutput> {
            self.record("checkout", branch.to_string())
        }

        fn init(&self, _dir: &Path) -> crate::Result<CommandOutput> {
            self.record("init", String::new())
        }

        fn set_config(&self, _dir: &Path, key: &str, value: &str) -> crate::Result<CommandOutput> {
            self.record("config", format!("{}={}", key, value))
        }

        fn add_remote(&self, _dir: &Path, name: &str, url: &str) -> crate::Result<CommandOutput> {
            self.record("remote", format!("{} {}", name, url))
        }

        fn stage_all(&self, _dir: &Path) -> crate::Result<CommandOutput> {
            self.record("add", String::new())
        }

        fn commit(&self, _dir: &Path, message: &str) -> crate::Result<CommandOutput> {
            self.record("commit", message.to_string())
        }

        fn rename_branch(&self, _dir: &Path, name: &str) -> crate::Result<CommandOutput> {
            self.record("branch", name.to_string())
        }

        fn remote_has_branch(&self, _dir: &Path, remote: &str, branch: &str) -> crate::Result<bool> {
            self.record("ls-remote", format!("{} {}", remote, branch))?;
            Ok(self.remote_branch)
        }

        fn pull_rebase(&self, _dir: &Path, remote: &str, branch: &str) -> crate::Result<CommandOutput> {
            self.record("pull", format!("{} {}", remote, branch))
        }

        fn push(
            &self,
            _dir: &Path,
            remote: &str,
            branch: &str,
            set_upstream: bool,
        ) -> crate::Result<CommandOutput> {
            self.record("push", format!("{} {} upstream={}", remote, branch, set_upstream))
        }
    }

    fn request(repo_dir: &Path) -> MigrationRequest {
        MigrationRequest {
            repo_dir: repo_dir.to_path_buf(),
            source_url: "https://src/repo.git".to_string(),
            destination_url: "https://dst/repo.git".to_string(),
            branch: "develop".to_string(),
            sub_dir: None,
            default_branch: "main".to_string(),
            use_ssh_source: false,
            use_ssh_destination: false,
            sync_before_push: None,
        }
    }

    fn migrator(vcs: FakeVcs) -> Migrator<FakeVcs> {
        Migrator::new(vcs, MigrationOptions::default())
    }

    #[test]
    fn test_happy_path_order() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("w");
        let m = migrator(FakeVcs::default());

        let result = m.run(&request(&work));

        assert_eq!(result, MigrationResult::success(work.display().to_string(), "main"));
        assert_eq!(
            *m.vcs().calls.borrow(),
            vec![
                "clone https://src/repo.git",
                "checkout develop",
                "init",
                "config core.autocrlf=false",
                "remote origin https://dst/repo.git",
                "add",
                "commit Initial commit from source repository",
                "branch main",
                "push origin main upstream=true",
            ]
        );
        // Source history is gone, content kept
        assert!(!work.join(".git").exists());
        assert!(work.join("README.md").exists());
        assert!(work.join("packages/core/a.txt").exists());
    }

    #[test]
    fn test_validation_failure_has_no_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("w");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("keep.txt"), "k").unwrap();

        let m = migrator(FakeVcs::default());
        let result = m.run_params(RequestParams {
            repo_dir: Some(work.display().to_string()),
            ..Default::default()
        });

        assert_eq!(
            result.error(),
            Some("Missing required parameters: source_url, destination_url, branch")
        );
        assert!(m.vcs().calls.borrow().is_empty());
        assert!(work.join("keep.txt").exists());
    }

    #[test]
    fn test_existing_workspace_is_wiped() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("w");
        fs::create_dir_all(work.join("stale/dir")).unwrap();
        fs::write(work.join("stale/dir/old.txt"), "old").unwrap();

        let result = migrator(FakeVcs::default()).run(&request(&work));

        assert!(result.is_success());
        assert!(!work.join("stale").exists());
    }

    #[test]
    fn test_subdir_promoted() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("w");
        let mut req = request(&work);
        req.sub_dir = Some(PathBuf::from("packages/core"));

        let result = migrator(FakeVcs::default()).run(&req);

        assert!(result.is_success());
        let mut names: Vec<String> = fs::read_dir(&work)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_missing_subdir_keeps_full_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("w");
        let mut req = request(&work);
        req.sub_dir = Some(PathBuf::from("packages/missing"));

        let result = migrator(FakeVcs::default()).run(&req);

        assert!(result.is_success());
        assert!(work.join("README.md").exists());
        assert!(work.join("packages/web/index.html").exists());
    }

    #[test]
    fn test_step_failure_messages() {
        let cases = [
            ("clone", "Failed to clone source repository"),
            ("checkout", "Failed to checkout branch: develop"),
            ("init", "Failed to initialize new repository"),
            ("config", "Failed to configure Git"),
            ("remote", "Failed to add remote"),
            ("add", "Failed to add files to Git"),
            ("commit", "Failed to commit files"),
            ("branch", "Failed to create branch: main"),
            ("push", "Failed to push to remote branch: main"),
        ];

        for (op, expected) in cases {
            let tmp = tempfile::tempdir().unwrap();
            let m = migrator(FakeVcs::failing_on(op));
            let result = m.run(&request(&tmp.path().join("w")));

            assert_eq!(result.error(), Some(expected), "failing on {op}");
            // Nothing runs after the failing operation
            assert_eq!(m.vcs().ops().last().map(String::as_str), Some(op));
        }
    }

    #[test]
    fn test_sync_skipped_when_remote_branch_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(&tmp.path().join("w"));
        req.sync_before_push = Some(true);
        let m = migrator(FakeVcs::default());

        assert!(m.run(&req).is_success());
        let ops = m.vcs().ops();
        assert!(ops.contains(&"ls-remote".to_string()));
        assert!(!ops.contains(&"pull".to_string()));
        assert_eq!(ops.last().map(String::as_str), Some("push"));
    }

    #[test]
    fn test_sync_pulls_when_remote_branch_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let m = Migrator::new(
            FakeVcs {
                remote_branch: true,
                ..Default::default()
            },
            MigrationOptions {
                sync_before_push: true,
            },
        );

        assert!(m.run(&request(&tmp.path().join("w"))).is_success());
        let ops = m.vcs().ops();
        let tail: Vec<&str> = ops.iter().rev().take(3).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["ls-remote", "pull", "push"]);
    }

    #[test]
    fn test_request_overrides_sync_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(&tmp.path().join("w"));
        req.sync_before_push = Some(false);
        let m = Migrator::new(
            FakeVcs::default(),
            MigrationOptions {
                sync_before_push: true,
            },
        );

        assert!(m.run(&req).is_success());
        assert!(!m.vcs().ops().contains(&"ls-remote".to_string()));
    }

    #[test]
    fn test_sync_failure_is_distinct_from_push() {
        let tmp = tempfile::tempdir().unwrap();
        let mut req = request(&tmp.path().join("w"));
        req.sync_before_push = Some(true);
        let m = migrator(FakeVcs {
            fail_on: Some("pull"),
            remote_branch: true,
            ..Default::default()
        });

        let result = m.run(&req);

        assert_eq!(
            result.error(),
            Some("Failed to pull remote changes for branch: main")
        );
        assert!(!m.vcs().ops().contains(&"push".to_string()));
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(Step::ExtractingSubdir.to_string(), "extract-subdir");
        assert_eq!(Step::Pushing.to_string(), "push");
    }

    #[test]
    fn test_check_remote_against_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = git2::Repository::init(tmp.path()).unwrap();
        raw.remote(REMOTE_NAME, "https://dst/repo.git").unwrap();

        assert_eq!(check_remote(tmp.path(), "https://dst/repo.git"), Some(true));
        assert_eq!(check_remote(tmp.path(), "https://other/repo.git"), Some(false));
        assert_eq!(check_remote(&tmp.path().join("absent"), "https://dst/repo.git"), None);
    }

    #[test]
    fn test_check_branch_against_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = git2::Repository::init(tmp.path()).unwrap();
        assert_eq!(check_branch(tmp.path(), "trunk"), Some(false));

        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree = raw.find_tree(raw.index().unwrap().write_tree().unwrap()).unwrap();
        raw.commit(Some("refs/heads/trunk"), &sig, &sig, "root", &tree, &[])
            .unwrap();
        raw.set_head("refs/heads/trunk").unwrap();

        assert_eq!(check_branch(tmp.path(), "trunk"), Some(true));
        assert_eq!(check_branch(tmp.path(), "main"), Some(false));
    }
}
