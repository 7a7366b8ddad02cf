//! System git backend
//!
//! The pipeline only needs a handful of read-only queries against the checkout:
//! the revision being built, the tag pointing at it, and whether tracked files
//! were modified. Each is one plumbing subprocess.

use super::SourceRevision;
use crate::core::error::{GitError, RailError, RailResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git backend using system git
pub struct SystemGit {
  /// Working tree root (`git rev-parse --show-toplevel`)
  work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> RailResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(RailError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(RailError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let work_tree = stdout.trim();

    Ok(Self {
      work_tree: PathBuf::from(work_tree),
    })
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> RailResult<String> {
    let stdout = self.run(&["rev-parse", "HEAD"])?;
    Ok(stdout.trim().to_string())
  }

  /// Get current branch name ("HEAD" when detached)
  pub fn current_branch(&self) -> RailResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Revision being built
  pub fn source_revision(&self) -> RailResult<SourceRevision> {
    Ok(SourceRevision {
      sha: self.head_commit()?,
      branch: self.current_branch()?,
    })
  }

  /// Tags pointing exactly at HEAD, sorted by git's version ordering (newest first)
  pub fn tags_at_head(&self) -> RailResult<Vec<String>> {
    let stdout = self.run(&["tag", "--points-at", "HEAD", "--sort=-v:refname"])?;
    Ok(
      stdout
        .lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect(),
    )
  }

  /// True when no tracked file differs from HEAD (untracked files are ignored)
  pub fn is_clean(&self) -> RailResult<bool> {
    let stdout = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
    Ok(stdout.trim().is_empty())
  }

  fn run(&self, args: &[&str]) -> RailResult<String> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Create a git command with an isolated environment
  ///
  /// - Runs against the working tree root
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  /// - Adds safe configuration overrides
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.work_tree);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }
    #[cfg(windows)]
    if let Ok(root) = std::env::var("SystemRoot") {
      cmd.env("SystemRoot", root);
    }

    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }
}
