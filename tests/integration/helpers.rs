//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Variables a CI host may set that would change what the binary does
const HOST_ENV: &[&str] = &[
  "GITHUB_EVENT_NAME",
  "GITHUB_REF",
  "GITHUB_REPOSITORY",
  "GITHUB_TOKEN",
  "DRAFTRAIL_LOG",
];

/// A git checkout to run pipelines in
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestWorkspace {
  /// Create a repository with one commit
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;
    git(&path, &["config", "tag.gpgsign", "false"])?;

    std::fs::write(path.join("README.md"), "# app\n")?;
    std::fs::write(path.join(".gitignore"), "dist/\n.draftrail/\nout/\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial commit"])?;

    Ok(Self { _root: root, path })
  }

  /// Write draftrail.toml and commit it
  pub fn configure(&self, config: &str) -> Result<()> {
    std::fs::write(self.path.join("draftrail.toml"), config)?;
    self.commit("Configure draftrail")?;
    Ok(())
  }

  /// Commit current changes
  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;

    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Lightweight tag at HEAD
  pub fn tag(&self, name: &str) -> Result<()> {
    git(&self.path, &["tag", name])?;
    Ok(())
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }

  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(())
  }

  /// Ids of recorded runs, oldest first
  pub fn run_ids(&self) -> Result<Vec<String>> {
    let runs = self.path.join(".draftrail/runs");
    if !runs.is_dir() {
      return Ok(Vec::new());
    }
    let mut ids: Vec<String> = std::fs::read_dir(runs)?
      .filter_map(|e| e.ok())
      .map(|e| e.file_name().to_string_lossy().to_string())
      .collect();
    ids.sort();
    Ok(ids)
  }

  /// Parsed run.json of a run
  pub fn run_record(&self, run_id: &str) -> Result<serde_json::Value> {
    let content = self.read_file(&format!(".draftrail/runs/{}/run.json", run_id))?;
    Ok(serde_json::from_str(&content)?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run draftrail and return its output whatever the exit status
pub fn draftrail(cwd: &Path, args: &[&str]) -> Result<Output> {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_draftrail"));
  cmd.current_dir(cwd).args(args);
  for var in HOST_ENV {
    cmd.env_remove(var);
  }
  cmd.output().context("Failed to run draftrail")
}

/// Run draftrail and fail unless it exits 0
pub fn run_draftrail(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = draftrail(cwd, args)?;

  if !output.status.success() {
    anyhow::bail!(
      "draftrail command failed: draftrail {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout(&output),
      stderr(&output)
    );
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}

/// Config with `sh` build steps and a local release host
///
/// `build_script` runs as the single script step; it should leave
/// `dist/image_ai_utils_windows.7z` behind to succeed.
#[cfg(unix)]
pub fn local_pipeline_config(build_script: &str, on_existing: &str) -> String {
  format!(
    r#"[pipeline]
name = "image-ai-utils"
tag_pattern = "v*"

[build]
env_dir = "venv"

[build.artifact]
name = "installer"
path = "dist/image_ai_utils_windows.7z"

[[build.steps]]
name = "Set up runtime"
kind = "runtime"
run = ["sh", "-c", "echo Python 3.10.12"]
expect_version = "3.10"

[[build.steps]]
name = "Build installer"
kind = "script"
run = ["sh", "-c", {script}]

[release]
files = "*.7z"
on_existing = "{on_existing}"

[host]
kind = "local"
dir = "out/releases"
"#,
    script = toml_string(build_script),
    on_existing = on_existing
  )
}

/// Script that produces the expected archive
#[cfg(unix)]
pub const GOOD_BUILD: &str = "mkdir -p dist && printf 7z-archive > dist/image_ai_utils_windows.7z";

#[cfg(unix)]
fn toml_string(s: &str) -> String {
  format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
