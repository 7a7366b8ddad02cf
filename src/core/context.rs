//! Workspace and run contexts
//!
//! `WorkspaceContext` is built once in main.rs and passed by reference to every
//! command. `RunContext` is the isolated, per-run scratch area: a fresh directory
//! under `pipeline.runs_dir` holding the artifact store, the release stage's
//! download directory and the run record. Nothing in it is shared between runs.
//!
//! ```text
//! .draftrail/runs/<run-id>/
//!   run.json              run record
//!   artifacts/<name>/     uploaded artifact + manifest.json
//!   download/             release stage copy of the artifact
//! ```

use crate::core::config::RailConfig;
use crate::core::error::{RailError, RailResult, ResultExt};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Unified workspace context containing all shared workspace-level data.
#[derive(Clone)]
pub struct WorkspaceContext {
  /// Workspace root directory (absolute path)
  pub root: PathBuf,

  /// draftrail.toml
  /// Optional because `init` runs before it exists
  pub config: Option<Arc<RailConfig>>,
}

impl WorkspaceContext {
  /// Build workspace context from a root directory.
  ///
  /// Config errors other than "not found" are surfaced here so a broken
  /// draftrail.toml is reported once, up front.
  pub fn build(workspace_root: &Path) -> RailResult<Self> {
    let root = workspace_root.to_path_buf();
    let config = if RailConfig::exists(&root) {
      Some(Arc::new(RailConfig::load(&root)?))
    } else {
      None
    };

    Ok(Self { root, config })
  }

  /// Get config or error if not found.
  pub fn require_config(&self) -> RailResult<&Arc<RailConfig>> {
    self
      .config
      .as_ref()
      .ok_or_else(|| RailError::with_help("No draftrail.toml found.", "Run 'draftrail init' to create one."))
  }

  /// Get workspace root as Path reference (convenience)
  pub fn workspace_root(&self) -> &Path {
    &self.root
  }

  /// Absolute directory holding all run directories
  pub fn runs_dir(&self) -> RailResult<PathBuf> {
    Ok(self.root.join(&self.require_config()?.pipeline.runs_dir))
  }
}

/// Isolated context of a single pipeline run
#[derive(Debug, Clone)]
pub struct RunContext {
  pub run_id: String,
  pub run_dir: PathBuf,
  pub created_at: DateTime<Utc>,
}

impl RunContext {
  /// Create a fresh run directory. Fails rather than reuse an existing one.
  pub fn create(runs_dir: &Path, seed: &str) -> RailResult<Self> {
    let created_at = Utc::now();
    let run_id = new_run_id(seed, created_at);
    let run_dir = runs_dir.join(&run_id);

    if run_dir.exists() {
      return Err(RailError::message(format!(
        "Run directory {} already exists",
        run_dir.display()
      )));
    }
    fs::create_dir_all(&run_dir).with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;

    tracing::debug!(run_id = %run_id, dir = %run_dir.display(), "created run context");
    Ok(Self {
      run_id,
      run_dir,
      created_at,
    })
  }

  /// Reopen an earlier run by id
  pub fn open(runs_dir: &Path, run_id: &str) -> RailResult<Self> {
    if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.contains("..") {
      return Err(RailError::message(format!("Invalid run id '{}'", run_id)));
    }
    let run_dir = runs_dir.join(run_id);
    if !run_dir.is_dir() {
      return Err(RailError::with_help(
        format!("Run '{}' not found in {}", run_id, runs_dir.display()),
        "List recorded runs with `draftrail status`.",
      ));
    }
    let created_at = fs::metadata(&run_dir)
      .and_then(|m| m.created().or_else(|_| m.modified()))
      .map(DateTime::<Utc>::from)
      .unwrap_or_else(|_| Utc::now());

    Ok(Self {
      run_id: run_id.to_string(),
      run_dir,
      created_at,
    })
  }

  pub fn artifacts_dir(&self) -> PathBuf {
    self.run_dir.join("artifacts")
  }

  pub fn download_dir(&self) -> PathBuf {
    self.run_dir.join("download")
  }

  pub fn record_path(&self) -> PathBuf {
    self.run_dir.join("run.json")
  }
}

/// `YYYYMMDDTHHMMSS-<8 hex>`; the hash covers the seed and the nanosecond clock
fn new_run_id(seed: &str, now: DateTime<Utc>) -> String {
  let mut hasher = Sha256::new();
  hasher.update(seed.as_bytes());
  hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
  hasher.update(std::process::id().to_le_bytes());
  let digest = format!("{:x}", hasher.finalize());
  format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &digest[..8])
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_runs_are_isolated() {
    let dir = TempDir::new().unwrap();
    let a = RunContext::create(dir.path(), "v1.0.0").unwrap();
    let b = RunContext::create(dir.path(), "v1.0.0").unwrap();
    assert_ne!(a.run_id, b.run_id);
    assert_ne!(a.run_dir, b.run_dir);
    assert!(a.run_dir.is_dir());
    assert!(b.run_dir.is_dir());
  }

  #[test]
  fn test_open_existing_and_missing() {
    let dir = TempDir::new().unwrap();
    let run = RunContext::create(dir.path(), "seed").unwrap();
    let reopened = RunContext::open(dir.path(), &run.run_id).unwrap();
    assert_eq!(reopened.run_dir, run.run_dir);

    assert!(RunContext::open(dir.path(), "nope").is_err());
    assert!(RunContext::open(dir.path(), "../escape").is_err());
  }

  #[test]
  fn test_run_id_shape() {
    let id = new_run_id("seed", Utc::now());
    let (stamp, hash) = id.split_once('-').unwrap();
    assert_eq!(stamp.len(), 15);
    assert_eq!(hash.len(), 8);
  }
}
