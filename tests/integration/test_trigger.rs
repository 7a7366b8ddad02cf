//! Tests for trigger evaluation through the CLI

use crate::helpers::*;
use anyhow::Result;

fn decision(workspace: &TestWorkspace, args: &[&str]) -> Result<serde_json::Value> {
  let mut full = vec!["trigger", "--json"];
  full.extend_from_slice(args);
  let output = run_draftrail(&workspace.path, &full)?;
  Ok(serde_json::from_str(&stdout(&output))?)
}

fn configured() -> Result<TestWorkspace> {
  let workspace = TestWorkspace::new()?;
  run_draftrail(&workspace.path, &["init", "--local"])?;
  workspace.commit("Configure draftrail")?;
  Ok(workspace)
}

#[test]
fn test_version_tag_push_starts_run() -> Result<()> {
  let workspace = configured()?;

  let d = decision(&workspace, &["--event", "push", "--ref", "refs/tags/v1.2.0"])?;
  assert_eq!(d["starts"], true);
  assert_eq!(d["trigger"]["tag"], "v1.2.0");
  assert_eq!(d["trigger"]["event"], "push");

  Ok(())
}

#[test]
fn test_other_events_are_skipped_with_exit_zero() -> Result<()> {
  let workspace = configured()?;

  for args in [
    vec!["--event", "push", "--ref", "refs/heads/main"],
    vec!["--event", "push", "--ref", "refs/tags/nightly"],
    vec!["--event", "pull_request", "--ref", "refs/tags/v1.0.0"],
    vec!["--event", "schedule"],
  ] {
    let d = decision(&workspace, &args)?;
    assert_eq!(d["starts"], false, "{:?}", args);
    assert!(d["reason"].as_str().is_some_and(|r| !r.is_empty()));
  }

  Ok(())
}

#[test]
fn test_manual_dispatch_picks_tag_at_head() -> Result<()> {
  let workspace = configured()?;
  workspace.tag("not-a-version")?;
  workspace.tag("v2.0.0")?;

  let d = decision(&workspace, &["--event", "workflow_dispatch"])?;
  assert_eq!(d["starts"], true);
  assert_eq!(d["trigger"]["tag"], "v2.0.0");

  let d = decision(&workspace, &["--event", "workflow_dispatch", "--tag", "v2.0.1"])?;
  assert_eq!(d["trigger"]["tag"], "v2.0.1");

  Ok(())
}

#[test]
fn test_dispatch_is_the_default_event() -> Result<()> {
  let workspace = configured()?;

  let output = run_draftrail(&workspace.path, &["trigger"])?;
  let out = stdout(&output);
  assert!(out.contains("Run starts"), "{}", out);
  assert!(out.contains("workflow_dispatch"));

  Ok(())
}
