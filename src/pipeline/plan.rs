//! Dry-run plans
//!
//! `draftrail run --dry-run` builds a `PipelinePlan` and prints it instead of
//! executing anything. The plan id is a hash of the operations, so the same
//! config and trigger always produce the same id.

use crate::core::config::{ExistingReleasePolicy, RailConfig, StepKind};
use crate::core::error::RailResult;
use crate::host;
use crate::pipeline::build::plan_steps;
use crate::trigger::RunTrigger;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Plan identifier (SHA256 hash of plan contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
  pub fn from_contents(contents: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Self(format!("{:x}", hasher.finalize()))
  }

  /// First 12 characters
  pub fn short(&self) -> &str {
    &self.0[..12.min(self.0.len())]
  }
}

impl fmt::Display for PlanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short())
  }
}

/// One thing a run would do
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
  RunStep {
    name: String,
    kind: StepKind,
    command: String,
  },
  UploadArtifact {
    name: String,
    path: String,
  },
  DownloadArtifact {
    name: String,
  },
  CheckExistingRelease {
    host: String,
    tag: Option<String>,
    on_existing: ExistingReleasePolicy,
  },
  CreateDraftRelease {
    host: String,
    tag: Option<String>,
    files: String,
    draft: bool,
    prerelease: bool,
  },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
  pub id: PlanId,
  pub pipeline: String,
  pub trigger: RunTrigger,
  pub build: Vec<Operation>,
  pub release: Vec<Operation>,
}

impl PipelinePlan {
  pub fn new(config: &RailConfig, workspace: &Path, trigger: RunTrigger, repository_override: Option<&str>) -> Self {
    let mut build: Vec<Operation> = plan_steps(&config.build, workspace)
      .into_iter()
      .map(|step| Operation::RunStep {
        command: step.invocation.display(),
        name: step.name,
        kind: step.kind,
      })
      .collect();
    build.push(Operation::UploadArtifact {
      name: config.build.artifact.name.clone(),
      path: config.build.artifact.path.display().to_string(),
    });

    let host = host::describe(&config.host, repository_override);
    let release = vec![
      Operation::DownloadArtifact {
        name: config.build.artifact.name.clone(),
      },
      Operation::CheckExistingRelease {
        host: host.clone(),
        tag: trigger.tag.clone(),
        on_existing: config.release.on_existing,
      },
      Operation::CreateDraftRelease {
        host,
        tag: trigger.tag.clone(),
        files: config.release.files.clone(),
        draft: true,
        prerelease: false,
      },
    ];

    let id = PlanId::from_contents(&serde_json::to_vec(&(&trigger, &build, &release)).unwrap_or_default());

    Self {
      id,
      pipeline: config.pipeline.name.clone(),
      trigger,
      build,
      release,
    }
  }

  pub fn to_json(&self) -> RailResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn len(&self) -> usize {
    self.build.len() + self.release.len()
  }

  pub fn to_human_readable(&self) -> String {
    let mut output = String::new();

    output.push_str(&format!(
      "📋 Plan: {} ({}), {} operations\n",
      self.pipeline,
      self.id,
      self.len()
    ));
    output.push_str(&format!("   Trigger: {}", self.trigger.event));
    if let Some(git_ref) = &self.trigger.git_ref {
      output.push_str(&format!(" on {}", git_ref));
    }
    output.push('\n');
    match (&self.trigger.tag, self.trigger.version()) {
      (Some(tag), Some(version)) => output.push_str(&format!("   Tag: {} (version {})\n", tag, version)),
      (Some(tag), None) => output.push_str(&format!("   Tag: {}\n", tag)),
      (None, _) => output.push_str("   Tag: <none> (release stage would fail)\n"),
    }

    output.push_str(&format!("\n   Build ({}):\n", self.build.len()));
    for (i, op) in self.build.iter().enumerate() {
      output.push_str(&format!("   {}. {}\n", i + 1, operation_to_string(op)));
    }

    output.push_str(&format!("\n   Release ({}):\n", self.release.len()));
    for (i, op) in self.release.iter().enumerate() {
      output.push_str(&format!("   {}. {}\n", i + 1, operation_to_string(op)));
    }

    output
  }
}

fn operation_to_string(op: &Operation) -> String {
  match op {
    Operation::RunStep { name, kind, command } => format!("[{}] {}: {}", kind, name, command),
    Operation::UploadArtifact { name, path } => format!("Upload {} as artifact '{}'", path, name),
    Operation::DownloadArtifact { name } => format!("Download artifact '{}'", name),
    Operation::CheckExistingRelease { host, tag, on_existing } => format!(
      "Check {} for a release {} (on existing: {:?})",
      host,
      tag.as_deref().unwrap_or("<no tag>"),
      on_existing
    ),
    Operation::CreateDraftRelease {
      host,
      tag,
      files,
      draft,
      prerelease,
    } => format!(
      "Create release {} on {} with '{}' (draft: {}, prerelease: {})",
      tag.as_deref().unwrap_or("<no tag>"),
      host,
      files,
      draft,
      prerelease
    ),
  }
}
