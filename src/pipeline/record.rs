//! Run records: what happened in a run, persisted as `run.json`

use crate::artifact::ArtifactManifest;
use crate::core::config::StepKind;
use crate::core::error::{RailError, RailResult, ResultExt};
use crate::core::vcs::SourceRevision;
use crate::host::ReleaseHandle;
use crate::trigger::RunTrigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Status of a stage or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
  Pending,
  Running,
  Succeeded,
  Failed,
  Skipped,
}

impl StageStatus {
  pub fn icon(self) -> &'static str {
    match self {
      StageStatus::Pending => "⚪",
      StageStatus::Running => "🔄",
      StageStatus::Succeeded => "✅",
      StageStatus::Failed => "❌",
      StageStatus::Skipped => "⏭️",
    }
  }
}

impl fmt::Display for StageStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageStatus::Pending => write!(f, "pending"),
      StageStatus::Running => write!(f, "running"),
      StageStatus::Succeeded => write!(f, "succeeded"),
      StageStatus::Failed => write!(f, "failed"),
      StageStatus::Skipped => write!(f, "skipped"),
    }
  }
}

/// One executed build step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
  pub name: String,
  pub kind: StepKind,
  pub status: StageStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exit_code: Option<i32>,
  pub duration_ms: u64,
}

/// Why a stage failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
  pub category: String,
  pub message: String,
}

/// Outcome of one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
  pub status: StageStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure: Option<StageFailure>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub steps: Vec<StepReport>,
}

impl StageReport {
  pub fn pending() -> Self {
    Self {
      status: StageStatus::Pending,
      started_at: None,
      finished_at: None,
      failure: None,
      note: None,
      steps: Vec::new(),
    }
  }

  pub fn start(&mut self) {
    self.status = StageStatus::Running;
    self.started_at = Some(Utc::now());
    self.finished_at = None;
    self.failure = None;
    self.note = None;
    self.steps.clear();
  }

  pub fn succeed(&mut self) {
    self.status = StageStatus::Succeeded;
    self.finished_at = Some(Utc::now());
  }

  pub fn fail(&mut self, err: &RailError) {
    self.status = StageStatus::Failed;
    self.finished_at = Some(Utc::now());
    self.failure = Some(StageFailure {
      category: err.category().unwrap_or("internal").to_string(),
      message: err.to_string(),
    });
  }

  pub fn skip(&mut self, note: impl Into<String>) {
    self.status = StageStatus::Skipped;
    self.finished_at = Some(Utc::now());
    self.note = Some(note.into());
  }

  pub fn duration_ms(&self) -> Option<i64> {
    match (self.started_at, self.finished_at) {
      (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
      _ => None,
    }
  }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  InProgress,
  Succeeded,
  Failed,
}

/// Everything recorded about a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id: String,
  pub pipeline: String,
  pub created_at: DateTime<Utc>,
  pub trigger: RunTrigger,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<SourceRevision>,
  pub build: StageReport,
  pub release: StageReport,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact: Option<ArtifactManifest>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub release_handle: Option<ReleaseHandle>,
}

impl RunRecord {
  pub fn new(
    run_id: impl Into<String>,
    pipeline: impl Into<String>,
    created_at: DateTime<Utc>,
    trigger: RunTrigger,
    revision: Option<SourceRevision>,
  ) -> Self {
    Self {
      run_id: run_id.into(),
      pipeline: pipeline.into(),
      created_at,
      trigger,
      revision,
      build: StageReport::pending(),
      release: StageReport::pending(),
      artifact: None,
      release_handle: None,
    }
  }

  /// Success only if both stages report success (a skipped release counts when
  /// the build succeeded and the release was skipped on purpose)
  pub fn status(&self) -> RunStatus {
    match (self.build.status, self.release.status) {
      (StageStatus::Failed, _) | (_, StageStatus::Failed) => RunStatus::Failed,
      (StageStatus::Succeeded, StageStatus::Succeeded) | (StageStatus::Succeeded, StageStatus::Skipped) => {
        RunStatus::Succeeded
      }
      _ => RunStatus::InProgress,
    }
  }

  pub fn load(path: &Path) -> RailResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read run record {}", path.display()))?;
    let record =
      serde_json::from_str(&content).with_context(|| format!("Failed to parse run record {}", path.display()))?;
    Ok(record)
  }

  /// Write atomically (temp file + rename)
  pub fn save(&self, path: &Path) -> RailResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(self)?).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
  }
}
