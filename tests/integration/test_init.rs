//! Tests for the `init` command and config loading

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_init_creates_default_pipeline() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  run_draftrail(&workspace.path, &["init"])?;

  assert!(workspace.file_exists("draftrail.toml"));
  let config = workspace.read_file("draftrail.toml")?;
  assert!(config.contains("dist/image_ai_utils_windows.7z"));
  assert!(config.contains("build_windows_installer.py"));
  assert!(config.contains("tag_pattern = \"v*\""));
  assert!(config.contains("kind = \"github\""));

  Ok(())
}

#[test]
fn test_init_refuses_to_overwrite_without_force() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  run_draftrail(&workspace.path, &["init"])?;

  let second = draftrail(&workspace.path, &["init", "--local"])?;
  assert_eq!(second.status.code(), Some(1));
  assert!(stderr(&second).contains("--force"));
  assert!(workspace.read_file("draftrail.toml")?.contains("kind = \"github\""));

  run_draftrail(&workspace.path, &["init", "--local", "--force"])?;
  assert!(workspace.read_file("draftrail.toml")?.contains("kind = \"local\""));

  Ok(())
}

#[test]
fn test_force_init_replaces_broken_config() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  workspace.write_file("draftrail.toml", "[build\nnot toml")?;

  let status = draftrail(&workspace.path, &["status"])?;
  assert_eq!(status.status.code(), Some(1));

  run_draftrail(&workspace.path, &["init", "--force"])?;
  run_draftrail(&workspace.path, &["status"])?;

  Ok(())
}

#[test]
fn test_commands_without_config_are_user_errors() -> Result<()> {
  let workspace = TestWorkspace::new()?;

  let output = draftrail(&workspace.path, &["run", "--event", "push", "--ref", "refs/tags/v1.0.0"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("draftrail init"));

  Ok(())
}

#[test]
fn test_invalid_artifact_path_is_rejected() -> Result<()> {
  let workspace = TestWorkspace::new()?;
  run_draftrail(&workspace.path, &["init", "--local"])?;
  let config = workspace
    .read_file("draftrail.toml")?
    .replace("dist/image_ai_utils_windows.7z", "dist/image_ai_utils_windows.zip");
  workspace.write_file("draftrail.toml", &config)?;

  let output = draftrail(&workspace.path, &["trigger"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains(".7z"));

  Ok(())
}
