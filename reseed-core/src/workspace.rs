//! Filesystem operations on the migration workspace
//!
//! Every operation reports a typed [`Error::Filesystem`] naming what it was
//! doing and to which path, so a half-finished subtree promotion can be
//! told apart from a failed wipe.

use std::fs;
use std::path::Path;

use crate::error::FsOp;
use crate::{Error, Result};

/// Name of the version-control metadata entry
pub const GIT_DIR: &str = ".git";

/// Remove `repo_dir` and everything under it, if it exists
///
/// Returns whether anything was removed.
pub fn reset(repo_dir: &Path) -> Result<bool> {
    // symlink_metadata so a dangling link still counts as existing
    let meta = match fs::symlink_metadata(repo_dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::fs(FsOp::ReadDir, repo_dir, e)),
    };

    tracing::info!(path = %repo_dir.display(), "Removing existing directory");
    remove_entry(repo_dir, &meta)?;
    Ok(true)
}

/// Delete the version-control metadata from `repo_dir`
///
/// Handles both a `.git` directory and a `.git` file pointing elsewhere.
pub fn strip_history(repo_dir: &Path) -> Result<bool> {
    let git_dir = repo_dir.join(GIT_DIR);
    let meta = match fs::symlink_metadata(&git_dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::fs(FsOp::ReadDir, git_dir, e)),
    };

    remove_entry(&git_dir, &meta)?;
    Ok(true)
}

/// Promote `repo_dir/sub_dir` to be the new root of `repo_dir`
///
/// The subtree is copied out to a scratch directory, everything in
/// `repo_dir` except `.git` is deleted, and the scratch copy is moved back
/// in. The scratch directory is removed when this returns, on every path.
///
/// Returns the number of top-level entries promoted.
pub fn extract_subtree(repo_dir: &Path, sub_dir: &Path) -> Result<usize> {
    let source = repo_dir.join(sub_dir);
    let scratch = tempfile::Builder::new()
        .prefix("reseed-subtree-")
        .tempdir()
        .map_err(|e| Error::fs(FsOp::CreateTemp, std::env::temp_dir(), e))?;

    tracing::debug!(
        from = %source.display(),
        scratch = %scratch.path().display(),
        "Copying subdirectory to scratch"
    );
    let promoted = copy_children(&source, scratch.path())?;

    tracing::debug!(path = %repo_dir.display(), "Clearing workspace except {}", GIT_DIR);
    for entry in read_dir(repo_dir)? {
        if entry.file_name() == GIT_DIR {
            continue;
        }
        let path = entry.path();
        let meta = fs::symlink_metadata(&path).map_err(|e| Error::fs(FsOp::ReadDir, &path, e))?;
        remove_entry(&path, &meta)?;
    }

    tracing::debug!(to = %repo_dir.display(), "Copying scratch into workspace");
    copy_children(scratch.path(), repo_dir)?;

    scratch
        .close()
        .map_err(|e| Error::fs(FsOp::Remove, std::env::temp_dir(), e))?;

    Ok(promoted)
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    fs::read_dir(dir)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| Error::fs(FsOp::ReadDir, dir, e))
}

fn remove_entry(path: &Path, meta: &fs::Metadata) -> Result<()> {
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| Error::fs(FsOp::Remove, path, e))
}

/// Copy every entry of `from` into the existing directory `to`
fn copy_children(from: &Path, to: &Path) -> Result<usize> {
    let entries = read_dir(from)?;
    let count = entries.len();
    for entry in entries {
        copy_entry(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(count)
}

fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from).map_err(|e| Error::fs(FsOp::ReadDir, from, e))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        copy_symlink(from, to)
    } else if file_type.is_dir() {
        fs::create_dir(to).map_err(|e| Error::fs(FsOp::CreateDir, to, e))?;
        copy_children(from, to).map(|_| ())
    } else {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| Error::fs(FsOp::Copy, from, e))
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| Error::fs(FsOp::Copy, from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| Error::fs(FsOp::Copy, to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| Error::fs(FsOp::Copy, from, e))
}
