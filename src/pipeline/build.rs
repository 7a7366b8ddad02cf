//! Build stage: run the configured steps, then upload the archive

use crate::artifact::{ArtifactManifest, ArtifactStore};
use crate::core::config::{BuildConfig, StepConfig, StepKind};
use crate::core::error::{RailResult, ResultExt, StageError};
use crate::pipeline::record::{StageStatus, StepReport};
use crate::pipeline::step::{Invocation, StepOutput, StepRunner};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const STDERR_TAIL_LINES: usize = 20;

/// A configured step with placeholders expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
  pub name: String,
  pub kind: StepKind,
  pub invocation: Invocation,
  pub expect_version: Option<String>,
}

/// Interpreter inside the isolated environment
pub fn env_python(workspace: &Path, env_dir: &Path) -> PathBuf {
  let env = workspace.join(env_dir);
  if cfg!(windows) {
    env.join("Scripts").join("python.exe")
  } else {
    env.join("bin").join("python")
  }
}

/// Expand `{env_python}` / `{workspace}` in every step
pub fn plan_steps(config: &BuildConfig, workspace: &Path) -> Vec<PlannedStep> {
  let python = env_python(workspace, &config.env_dir).display().to_string();
  let root = workspace.display().to_string();
  let expand = |arg: &str| arg.replace("{env_python}", &python).replace("{workspace}", &root);

  config
    .steps
    .iter()
    .map(|step: &StepConfig| {
      let mut argv = step.run.iter().map(|a| expand(a));
      let program = argv.next().unwrap_or_default();
      PlannedStep {
        name: step.name.clone(),
        kind: step.kind,
        invocation: Invocation {
          program,
          args: argv.collect(),
          cwd: workspace.to_path_buf(),
          capture: step.kind == StepKind::Runtime,
        },
        expect_version: step.expect_version.clone(),
      }
    })
    .collect()
}

/// Failure of a step, classified by the step's kind
fn step_failure(step: &PlannedStep, reason: String) -> StageError {
  let name = step.name.clone();
  match step.kind {
    StepKind::Runtime | StepKind::Environment => StageError::Provision { step: name, reason },
    StepKind::Install => StageError::DependencyInstall { step: name, reason },
    StepKind::Script => StageError::BuildScript { step: name, reason },
  }
}

/// First `x.y[.z]` in the output must equal or extend `expected`
pub fn check_runtime_version(output: &str, expected: &str) -> Result<String, String> {
  let re = Regex::new(r"(\d+\.\d+(?:\.\d+)?)").map_err(|e| e.to_string())?;
  let found = re
    .captures(output)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string())
    .ok_or_else(|| format!("no version number in output '{}'", output.trim()))?;

  if found == expected || found.starts_with(&format!("{}.", expected)) {
    Ok(found)
  } else {
    Err(format!("found version {}, expected {}", found, expected))
  }
}

fn stderr_tail(output: &StepOutput) -> String {
  let lines: Vec<&str> = output.stderr.lines().collect();
  let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
  lines[start..].join("\n")
}

pub struct BuildStage<'a> {
  config: &'a BuildConfig,
  workspace: &'a Path,
  runner: &'a dyn StepRunner,
}

impl<'a> BuildStage<'a> {
  pub fn new(config: &'a BuildConfig, workspace: &'a Path, runner: &'a dyn StepRunner) -> Self {
    Self {
      config,
      workspace,
      runner,
    }
  }

  /// Run every step in order, stop at the first failure, then upload the archive
  ///
  /// Step outcomes are appended to `steps` as they finish, including the failing one.
  pub fn execute(&self, store: &ArtifactStore, steps: &mut Vec<StepReport>) -> RailResult<ArtifactManifest> {
    self.clear_stale_artifact()?;

    let planned = plan_steps(self.config, self.workspace);
    let total = planned.len();
    for (idx, step) in planned.iter().enumerate() {
      crate::say!("📌 [{}/{}] {}", idx + 1, total, step.name);
      crate::say!("   $ {}", step.invocation.display());

      let started = Instant::now();
      let result = self.run_step(step);
      let duration_ms = started.elapsed().as_millis() as u64;

      let (status, exit_code) = match &result {
        Ok(code) => (StageStatus::Succeeded, *code),
        Err((code, _)) => (StageStatus::Failed, *code),
      };
      steps.push(StepReport {
        name: step.name.clone(),
        kind: step.kind,
        status,
        exit_code,
        duration_ms,
      });

      if let Err((_, err)) = result {
        tracing::error!(step = %step.name, kind = %step.kind, "build step failed");
        return Err(err.into());
      }
      tracing::info!(step = %step.name, duration_ms, "build step finished");
    }

    crate::say!("📦 Uploading artifact '{}'", self.config.artifact.name);
    store.upload(&self.config.artifact.name, self.workspace, &self.config.artifact.path)
  }

  /// An archive left over from an earlier build must not stand in for this one
  fn clear_stale_artifact(&self) -> RailResult<()> {
    let path = self.workspace.join(&self.config.artifact.path);
    if path.is_file() {
      tracing::info!(path = %path.display(), "removing stale artifact before build");
      fs::remove_file(&path).with_context(|| format!("Failed to remove stale artifact {}", path.display()))?;
    }
    Ok(())
  }

  fn run_step(&self, step: &PlannedStep) -> Result<Option<i32>, (Option<i32>, StageError)> {
    let output = self.runner.run(&step.invocation).map_err(|e| {
      let reason = if e.kind() == std::io::ErrorKind::NotFound {
        format!("program '{}' not found", step.invocation.program)
      } else {
        format!("could not start '{}': {}", step.invocation.program, e)
      };
      (None, step_failure(step, reason))
    })?;

    if !output.success {
      let mut reason = match output.exit_code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
      };
      let tail = stderr_tail(&output);
      if !tail.is_empty() {
        reason = format!("{}\n{}", reason, tail);
      }
      return Err((output.exit_code, step_failure(step, reason)));
    }

    if let Some(expected) = &step.expect_version {
      // Python 2 and some runtimes print the version on stderr
      let text = format!("{}\n{}", output.stdout, output.stderr);
      match check_runtime_version(&text, expected) {
        Ok(found) => crate::say!("   runtime version {}", found),
        Err(reason) => return Err((output.exit_code, step_failure(step, reason))),
      }
    }

    Ok(output.exit_code)
  }
}
