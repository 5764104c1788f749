//! Git adapter for the project directory.
//!
//! The loop only needs two things from git: make sure a repository exists
//! before the bootstrap session, and summarize repository state after each
//! session so the operator can see whether the agent committed its work.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

/// Snapshot of repository state for the post-session summary.
///
/// Built best-effort: a git failure downgrades to partial information rather
/// than failing the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitSummary {
    pub initialized: bool,
    pub branch: String,
    /// Short hash and subject of the latest commit, if any exist.
    pub last_commit: Option<(String, String)>,
    pub uncommitted_changes: bool,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True when the project has a `.git` directory.
    pub fn is_initialized(&self) -> bool {
        self.workdir.join(".git").is_dir()
    }

    /// Run `git init` and verify the repository actually appeared.
    pub fn init(&self) -> Result<()> {
        self.run_checked(&["init"])?;
        if !self.is_initialized() {
            return Err(anyhow!("git init succeeded but .git directory not found"));
        }
        Ok(())
    }

    /// Current branch name (errors on detached HEAD or missing repo).
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// True when the working tree has staged, unstaged, or untracked changes.
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        Ok(!out.trim().is_empty())
    }

    /// Short hash and subject of the latest commit; `None` before any commit.
    pub fn last_commit(&self) -> Result<Option<(String, String)>> {
        let output = self.run(&["log", "-1", "--format=%h%x00%s"])?;
        if !output.status.success() {
            // No commits yet.
            return Ok(None);
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        let line = raw.trim();
        match line.split_once('\0') {
            Some((hash, subject)) => Ok(Some((hash.to_string(), subject.to_string()))),
            None => Ok(None),
        }
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Make sure the project directory is a git repository, initializing it if
/// needed. Returns a short human-readable message about what happened.
pub fn ensure_initialized(project_dir: &Path) -> Result<String> {
    let git = Git::new(project_dir);
    if git.is_initialized() {
        debug!("repository already initialized");
        return Ok("repository already initialized".to_string());
    }
    git.init().context("initialize git repository")?;
    Ok("repository initialized".to_string())
}

/// Best-effort repository summary; git failures leave fields at their
/// defaults instead of propagating.
pub fn summarize(project_dir: &Path) -> GitSummary {
    let git = Git::new(project_dir);
    let mut summary = GitSummary::default();
    if !git.is_initialized() {
        return summary;
    }
    summary.initialized = true;

    match git.current_branch() {
        Ok(branch) => summary.branch = branch,
        Err(err) => warn!(err = %err, "could not read current branch"),
    }
    match git.has_uncommitted_changes() {
        Ok(dirty) => summary.uncommitted_changes = dirty,
        Err(err) => warn!(err = %err, "could not read worktree status"),
    }
    match git.last_commit() {
        Ok(commit) => summary.last_commit = commit,
        Err(err) => warn!(err = %err, "could not read last commit"),
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configure_identity(dir: &Path) {
        for (key, value) in [("user.email", "test@example.com"), ("user.name", "Test")] {
            let status = Command::new("git")
                .args(["config", key, value])
                .current_dir(dir)
                .status()
                .expect("git config");
            assert!(status.success());
        }
    }

    #[test]
    fn ensure_initialized_creates_a_repository_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let msg = ensure_initialized(temp.path()).expect("init");
        assert_eq!(msg, "repository initialized");

        let msg = ensure_initialized(temp.path()).expect("idempotent");
        assert_eq!(msg, "repository already initialized");
        assert!(Git::new(temp.path()).is_initialized());
    }

    #[test]
    fn summarize_on_plain_directory_reports_uninitialized() {
        let temp = tempfile::tempdir().expect("tempdir");
        let summary = summarize(temp.path());
        assert!(!summary.initialized);
        assert_eq!(summary.last_commit, None);
    }

    #[test]
    fn summarize_tracks_commits_and_dirty_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        ensure_initialized(temp.path()).expect("init");
        configure_identity(temp.path());

        std::fs::write(temp.path().join("a.txt"), "one").expect("write");
        let summary = summarize(temp.path());
        assert!(summary.initialized);
        assert!(summary.uncommitted_changes);
        assert_eq!(summary.last_commit, None);

        for args in [
            vec!["add", "-A"],
            vec!["commit", "-m", "add a.txt"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(temp.path())
                .status()
                .expect("git");
            assert!(status.success());
        }

        let summary = summarize(temp.path());
        assert!(!summary.uncommitted_changes);
        let (_, subject) = summary.last_commit.expect("commit");
        assert_eq!(subject, "add a.txt");
    }
}
