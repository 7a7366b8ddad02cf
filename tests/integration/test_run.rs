//! End-to-end pipeline runs with `sh` build steps and the local release host

#![cfg(unix)]

use crate::helpers::*;
use anyhow::Result;

const TAG_PUSH: &[&str] = &["--event", "push", "--ref", "refs/tags/v1.2.0"];

fn run_args(extra: &[&str]) -> Vec<String> {
  ["run"]
    .iter()
    .chain(TAG_PUSH)
    .chain(extra)
    .map(|s| s.to_string())
    .collect()
}

fn exec(workspace: &TestWorkspace, extra: &[&str]) -> Result<std::process::Output> {
  let args = run_args(extra);
  let refs: Vec<&str> = args.iter().map(String::as_str).collect();
  draftrail(&workspace.path, &refs)
}

fn pipeline(build_script: &str, on_existing: &str) -> Result<TestWorkspace> {
  let workspace = TestWorkspace::new()?;
  workspace.configure(&local_pipeline_config(build_script, on_existing))?;
  workspace.tag("v1.2.0")?;
  Ok(workspace)
}

#[test]
fn test_tag_push_publishes_draft_release() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;

  let output = exec(&workspace, &[])?;
  assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

  let release: serde_json::Value = serde_json::from_str(&workspace.read_file("out/releases/v1.2.0/release.json")?)?;
  assert_eq!(release["tag"], "v1.2.0");
  assert_eq!(release["draft"], true);
  assert_eq!(release["prerelease"], false);
  assert_eq!(release["assets"], serde_json::json!(["image_ai_utils_windows.7z"]));
  assert_eq!(
    workspace.read_file("out/releases/v1.2.0/assets/image_ai_utils_windows.7z")?,
    "7z-archive"
  );

  let ids = workspace.run_ids()?;
  assert_eq!(ids.len(), 1);
  let record = workspace.run_record(&ids[0])?;
  assert_eq!(record["build"]["status"], "succeeded");
  assert_eq!(record["release"]["status"], "succeeded");
  assert_eq!(record["artifact"]["file_name"], "image_ai_utils_windows.7z");
  assert_eq!(record["revision"]["branch"], "main");

  // Attached to the release, so only the manifest stays in the run
  let artifacts = format!(".draftrail/runs/{}/artifacts/installer", ids[0]);
  assert!(workspace.file_exists(&format!("{}/manifest.json", artifacts)));
  assert!(!workspace.file_exists(&format!("{}/image_ai_utils_windows.7z", artifacts)));

  Ok(())
}

#[test]
fn test_json_run_prints_only_the_record() -> Result<()> {
  let workspace = pipeline("echo building on stdout; mkdir -p dist && printf 7z-archive > dist/image_ai_utils_windows.7z", "fail")?;

  let output = exec(&workspace, &["--json"])?;
  assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

  let record: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(record["build"]["status"], "succeeded");
  assert_eq!(record["release"]["status"], "succeeded");
  assert!(stderr(&output).contains("building on stdout"));
  assert!(stderr(&output).contains("Build stage"));

  Ok(())
}

#[test]
fn test_branch_push_does_nothing() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;

  let output = run_draftrail(&workspace.path, &["run", "--event", "push", "--ref", "refs/heads/main"])?;
  assert!(stdout(&output).contains("Not triggered"));
  assert!(workspace.run_ids()?.is_empty());
  assert!(!workspace.file_exists("dist"));
  assert!(!workspace.file_exists("out/releases"));

  Ok(())
}

#[test]
fn test_failed_build_creates_no_release() -> Result<()> {
  let workspace = pipeline("echo compiler exploded >&2; exit 1", "fail")?;

  let output = exec(&workspace, &[])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("Build installer"));
  assert!(!workspace.file_exists("out/releases/v1.2.0"));

  let ids = workspace.run_ids()?;
  let record = workspace.run_record(&ids[0])?;
  assert_eq!(record["build"]["status"], "failed");
  assert_eq!(record["build"]["failure"]["category"], "build-script");
  assert_eq!(record["release"]["status"], "skipped");

  let status = run_draftrail(&workspace.path, &["status", "--json"])?;
  let runs: serde_json::Value = serde_json::from_str(&stdout(&status))?;
  assert_eq!(runs[0]["status"], "failed");
  assert_eq!(runs[0]["failure"], "build-script");

  Ok(())
}

#[test]
fn test_build_without_archive_is_artifact_missing() -> Result<()> {
  let workspace = pipeline("mkdir -p dist && echo built", "fail")?;

  let output = exec(&workspace, &[])?;
  assert_eq!(output.status.code(), Some(3));
  let ids = workspace.run_ids()?;
  assert_eq!(workspace.run_record(&ids[0])?["build"]["failure"]["category"], "artifact-missing");
  assert!(!workspace.file_exists("out/releases/v1.2.0"));

  Ok(())
}

#[test]
fn test_rerun_for_released_tag_fails_by_default() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;

  assert_eq!(exec(&workspace, &[])?.status.code(), Some(0));
  let first = workspace.read_file("out/releases/v1.2.0/release.json")?;

  let second = exec(&workspace, &[])?;
  assert_eq!(second.status.code(), Some(3));
  assert!(stderr(&second).contains("already exists"));
  assert_eq!(workspace.read_file("out/releases/v1.2.0/release.json")?, first);

  Ok(())
}

#[test]
fn test_rerun_for_released_tag_can_skip() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "skip")?;

  assert_eq!(exec(&workspace, &[])?.status.code(), Some(0));
  let first = workspace.read_file("out/releases/v1.2.0/release.json")?;

  let second = exec(&workspace, &[])?;
  assert_eq!(second.status.code(), Some(0), "stderr: {}", stderr(&second));
  assert_eq!(workspace.read_file("out/releases/v1.2.0/release.json")?, first);

  let ids = workspace.run_ids()?;
  assert_eq!(ids.len(), 2);
  assert_eq!(workspace.run_record(&ids[1])?["release"]["status"], "skipped");

  Ok(())
}

#[test]
fn test_dry_run_executes_nothing() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;

  let output = exec(&workspace, &["--dry-run"])?;
  assert_eq!(output.status.code(), Some(0));
  let out = stdout(&output);
  assert!(out.contains("Plan: image-ai-utils"));
  assert!(out.contains("Build installer"));
  assert!(out.contains("draft: true, prerelease: false"));

  assert!(workspace.run_ids()?.is_empty());
  assert!(!workspace.file_exists("dist"));

  Ok(())
}

#[test]
fn test_dirty_checkout_needs_allow_dirty() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;
  workspace.write_file("README.md", "# changed\n")?;

  let output = exec(&workspace, &[])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("uncommitted"));
  assert!(workspace.run_ids()?.is_empty());

  let output = exec(&workspace, &["--allow-dirty"])?;
  assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

  Ok(())
}

#[test]
fn test_build_then_release_by_run_id() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "fail")?;

  run_draftrail(&workspace.path, &["build", "--event", "push", "--ref", "refs/tags/v1.2.0"])?;
  let ids = workspace.run_ids()?;
  assert_eq!(ids.len(), 1);
  assert!(!workspace.file_exists("out/releases/v1.2.0"));

  // The workspace copy is not what gets released
  std::fs::remove_file(workspace.path.join("dist/image_ai_utils_windows.7z"))?;

  run_draftrail(&workspace.path, &["release", "--run", &ids[0]])?;
  assert!(workspace.file_exists("out/releases/v1.2.0/assets/image_ai_utils_windows.7z"));
  assert_eq!(workspace.run_record(&ids[0])?["release"]["status"], "succeeded");

  Ok(())
}

#[test]
fn test_release_refuses_failed_build() -> Result<()> {
  let workspace = pipeline("exit 4", "fail")?;

  let build = draftrail(&workspace.path, &["build", "--event", "push", "--ref", "refs/tags/v1.2.0"])?;
  assert_eq!(build.status.code(), Some(3));
  let ids = workspace.run_ids()?;

  let release = draftrail(&workspace.path, &["release", "--run", &ids[0]])?;
  assert_eq!(release.status.code(), Some(3));
  assert!(stderr(&release).contains("did not succeed"));
  assert!(!workspace.file_exists("out/releases"));

  Ok(())
}

#[test]
fn test_published_run_cannot_release_again() -> Result<()> {
  let workspace = pipeline(GOOD_BUILD, "skip")?;

  run_draftrail(&workspace.path, &["build", "--event", "push", "--ref", "refs/tags/v1.2.0"])?;
  let ids = workspace.run_ids()?;
  run_draftrail(&workspace.path, &["release", "--run", &ids[0]])?;
  let first = workspace.run_record(&ids[0])?;
  assert_eq!(first["release"]["status"], "succeeded");

  let again = draftrail(&workspace.path, &["release", "--run", &ids[0]])?;
  assert_eq!(again.status.code(), Some(1));
  assert!(stderr(&again).contains("already published release v1.2.0"));

  let record = workspace.run_record(&ids[0])?;
  assert_eq!(record["release"]["status"], "succeeded");
  assert_eq!(record["release_handle"], first["release_handle"]);

  Ok(())
}
