use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::context::WorkspaceContext;
use crate::core::error::{RailResult, ResultExt};
use crate::pipeline::{RunRecord, RunStatus, StageStatus};

/// Status line of a single run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub run_id: String,
  pub status: RunStatus,
  pub event: String,
  pub tag: Option<String>,
  pub build: StageStatus,
  pub release: StageStatus,
  /// Category of the first failure, if any
  pub failure: Option<String>,
  pub release_url: Option<String>,
}

impl From<&RunRecord> for RunSummary {
  fn from(record: &RunRecord) -> Self {
    let failure = record
      .build
      .failure
      .as_ref()
      .or(record.release.failure.as_ref())
      .map(|f| f.category.clone());
    Self {
      run_id: record.run_id.clone(),
      status: record.status(),
      event: record.trigger.event.to_string(),
      tag: record.trigger.tag.clone(),
      build: record.build.status,
      release: record.release.status,
      failure,
      release_url: record.release_handle.as_ref().and_then(|h| h.url.clone()),
    }
  }
}

/// Run the status command
pub fn run_status(ctx: &WorkspaceContext, json: bool) -> RailResult<()> {
  let runs = collect_runs(&ctx.runs_dir()?)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&runs)?);
  } else {
    print_status_table(&runs);
  }
  Ok(())
}

/// Every readable run record under `runs_dir`, oldest first
pub fn collect_runs(runs_dir: &Path) -> RailResult<Vec<RunSummary>> {
  if !runs_dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut runs = Vec::new();
  for entry in fs::read_dir(runs_dir).with_context(|| format!("Failed to list {}", runs_dir.display()))? {
    let path = entry?.path().join("run.json");
    if !path.is_file() {
      continue;
    }
    match RunRecord::load(&path) {
      Ok(record) => runs.push(RunSummary::from(&record)),
      Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable run record"),
    }
  }
  // Run ids start with a UTC timestamp
  runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
  Ok(runs)
}

fn print_status_table(runs: &[RunSummary]) {
  if runs.is_empty() {
    println!("No runs recorded yet.");
    return;
  }

  println!("\n📊 Runs\n");
  println!(
    "{:<26} {:<18} {:<12} {:<11} {:<11} DETAIL",
    "RUN", "EVENT", "TAG", "BUILD", "RELEASE"
  );
  println!("{:-<100}", "");

  for run in runs {
    let detail = match (&run.failure, &run.release_url) {
      (Some(category), _) => category.clone(),
      (None, Some(url)) => url.clone(),
      (None, None) => String::new(),
    };
    println!(
      "{:<26} {:<18} {:<12} {:<11} {:<11} {}",
      run.run_id,
      run.event,
      run.tag.as_deref().unwrap_or("-"),
      format!("{} {}", run.build.icon(), run.build),
      format!("{} {}", run.release.icon(), run.release),
      detail
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::error::{RailError, StageError};
  use crate::trigger::{EventKind, RunTrigger};
  use chrono::Utc;
  use tempfile::TempDir;

  fn write_record(runs_dir: &Path, run_id: &str, build_ok: bool) {
    let dir = runs_dir.join(run_id);
    fs::create_dir_all(&dir).unwrap();
    let mut record = RunRecord::new(
      run_id,
      "windows-installer",
      Utc::now(),
      RunTrigger {
        event: EventKind::WorkflowDispatch,
        git_ref: None,
        tag: Some("v1.0.0".into()),
      },
      None,
    );
    record.build.start();
    if build_ok {
      record.build.succeed();
      record.release.start();
      record.release.succeed();
    } else {
      record.build.fail(&RailError::from(StageError::BuildScript {
        step: "Build installer".into(),
        reason: "exited with status 1".into(),
      }));
      record.release.skip("build stage did not succeed");
    }
    record.save(&dir.join("run.json")).unwrap();
  }

  #[test]
  fn test_collect_runs_sorted_with_failures() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), "20260102T000000-bbbbbbbb", false);
    write_record(dir.path(), "20260101T000000-aaaaaaaa", true);
    fs::create_dir_all(dir.path().join("not-a-run")).unwrap();
    fs::create_dir_all(dir.path().join("broken")).unwrap();
    fs::write(dir.path().join("broken/run.json"), "{").unwrap();

    let runs = collect_runs(dir.path()).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, "20260101T000000-aaaaaaaa");
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[1].status, RunStatus::Failed);
    assert_eq!(runs[1].failure.as_deref(), Some("build-script"));
    assert_eq!(runs[1].release, StageStatus::Skipped);
  }

  #[test]
  fn test_missing_runs_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    assert!(collect_runs(&dir.path().join("nope")).unwrap().is_empty());
  }
}
