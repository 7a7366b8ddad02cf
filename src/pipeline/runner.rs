//! Stage ordering and run record bookkeeping

use crate::artifact::ArtifactStore;
use crate::core::config::RailConfig;
use crate::core::context::RunContext;
use crate::core::credential::Credential;
use crate::core::error::{RailError, RailResult, StageError};
use crate::host::ReleaseHost;
use crate::pipeline::build::BuildStage;
use crate::pipeline::record::{RunRecord, RunStatus, StageStatus};
use crate::pipeline::release::{ReleaseOutcome, ReleaseStage};
use crate::pipeline::step::StepRunner;
use std::path::Path;

/// Final record of a run plus the error that stopped it, if any
#[derive(Debug)]
pub struct RunOutcome {
  pub record: RunRecord,
  pub error: Option<RailError>,
}

impl RunOutcome {
  pub fn succeeded(&self) -> bool {
    self.error.is_none() && self.record.status() == RunStatus::Succeeded
  }
}

/// Stages bound to one workspace; the release host is a parameter of the
/// release stage only, so a build can run without one
pub struct Pipeline<'a> {
  config: &'a RailConfig,
  workspace: &'a Path,
  runner: &'a dyn StepRunner,
}

impl<'a> Pipeline<'a> {
  pub fn new(config: &'a RailConfig, workspace: &'a Path, runner: &'a dyn StepRunner) -> Self {
    Self {
      config,
      workspace,
      runner,
    }
  }

  /// Build, then release if the build succeeded
  pub fn run(
    &self,
    run: &RunContext,
    mut record: RunRecord,
    host: &dyn ReleaseHost,
    credential: Option<&Credential>,
  ) -> RunOutcome {
    if let Err(err) = self.build(run, &mut record) {
      record.release.skip("build stage did not succeed");
      self.persist_after_failure(run, &record);
      return RunOutcome {
        record,
        error: Some(err),
      };
    }

    let error = self.release(run, &mut record, host, credential).err();
    RunOutcome { record, error }
  }

  /// Build stage; the record is saved when the stage starts and when it ends
  pub fn build(&self, run: &RunContext, record: &mut RunRecord) -> RailResult<()> {
    crate::say!("\n🔨 Build stage");
    record.build.start();
    record.artifact = None;
    save(run, record)?;

    let store = ArtifactStore::new(run.artifacts_dir());
    let mut steps = Vec::new();
    let result = BuildStage::new(&self.config.build, self.workspace, self.runner).execute(&store, &mut steps);
    record.build.steps = steps;

    match result {
      Ok(manifest) => {
        crate::say!("✅ Build succeeded: {} ({} bytes)", manifest.file_name, manifest.size);
        record.artifact = Some(manifest);
        record.build.succeed();
        save(run, record)
      }
      Err(err) => {
        record.build.fail(&err);
        self.persist_after_failure(run, record);
        Err(err)
      }
    }
  }

  /// Release stage; refuses to start unless the record holds a successful build
  /// and no release was published by this run yet
  pub fn release(
    &self,
    run: &RunContext,
    record: &mut RunRecord,
    host: &dyn ReleaseHost,
    credential: Option<&Credential>,
  ) -> RailResult<()> {
    if record.build.status != StageStatus::Succeeded || record.artifact.is_none() {
      return Err(
        StageError::BuildNotSucceeded {
          run_id: record.run_id.clone(),
        }
        .into(),
      );
    }

    if record.release.status == StageStatus::Succeeded {
      let tag = record.release_handle.as_ref().map_or("<unknown>", |h| h.tag.as_str());
      return Err(RailError::with_help(
        format!("Run {} already published release {}", record.run_id, tag),
        "Each run publishes once. Start a new run to build and release again.",
      ));
    }

    crate::say!("\n🏷️  Release stage ({})", host.name());
    record.release.start();
    record.release_handle = None;
    save(run, record)?;

    let store = ArtifactStore::new(run.artifacts_dir());
    let result = ReleaseStage::new(&self.config.release, &self.config.build.artifact.name, host).execute(
      &store,
      &run.download_dir(),
      record.trigger.tag.as_deref(),
      credential,
    );

    match result {
      Ok(ReleaseOutcome::Created(handle)) => {
        crate::say!(
          "✅ Draft release {} created{}",
          handle.tag,
          handle.url.as_deref().map(|u| format!(": {}", u)).unwrap_or_default()
        );
        record.release_handle = Some(handle);
        record.release.succeed();
      }
      Ok(ReleaseOutcome::Existing(handle)) => {
        crate::say!("⏭️  Release {} already exists; left untouched", handle.tag);
        record.release.skip(format!("release {} already exists (id {})", handle.tag, handle.id));
      }
      Err(err) => {
        record.release.fail(&err);
        self.persist_after_failure(run, record);
        return Err(err);
      }
    }
    save(run, record)
  }

  /// The stage error is what the caller reports; a failed save is only logged
  fn persist_after_failure(&self, run: &RunContext, record: &RunRecord) {
    if let Err(e) = save(run, record) {
      tracing::warn!(run_id = %run.run_id, error = %e, "could not save run record");
    }
  }
}

fn save(run: &RunContext, record: &RunRecord) -> RailResult<()> {
  record.save(&run.record_path())
}
