//! CLI commands for draftrail
//!
//! ## Setup
//! - **init**: write a default draftrail.toml
//!
//! ## Pipeline
//! - **trigger**: evaluate an event without running anything
//! - **run**: evaluate, then build and release
//! - **build**: build stage only, in a fresh run
//! - **release**: release stage for an earlier run
//!
//! ## Inspection
//! - **status**: recorded runs and their stage outcomes
//!
//! All commands accept `&WorkspaceContext` to avoid redundant config loads.

pub mod build;
pub mod init;
pub mod release;
pub mod run;
pub mod status;
pub mod trigger;

pub use build::run_build;
pub use init::run_init;
pub use release::run_release;
pub use run::run_pipeline;
pub use status::run_status;
pub use trigger::run_trigger;

use crate::core::config::RailConfig;
use crate::core::context::{RunContext, WorkspaceContext};
use crate::core::credential::Credential;
use crate::core::error::{RailError, RailResult, StageError};
use crate::core::vcs::SystemGit;
use crate::host::{self, ReleaseHost};
use crate::pipeline::RunRecord;
use crate::trigger::{RunTrigger, TagPattern, TriggerDecision, TriggerEvent, evaluate};

/// Event inputs shared by `trigger`, `run` and `build`
#[derive(Debug, Clone)]
pub struct EventArgs {
  pub event: String,
  pub git_ref: Option<String>,
  pub tag: Option<String>,
}

/// Evaluate the event; a starting manual dispatch without a tag picks up a
/// matching tag at HEAD when the workspace is a git checkout
pub(crate) fn decide(ctx: &WorkspaceContext, args: &EventArgs) -> RailResult<TriggerDecision> {
  let config = ctx.require_config()?;
  let pattern = TagPattern::new(&config.pipeline.tag_pattern)?;
  let event = TriggerEvent::parse(&args.event, args.git_ref.as_deref());

  let mut decision = evaluate(&event, &pattern, args.tag.as_deref());
  if let TriggerDecision::Start(run_trigger) = &mut decision
    && run_trigger.is_manual()
    && run_trigger.tag.is_none()
  {
    match SystemGit::open(ctx.workspace_root()).and_then(|git| git.tags_at_head()) {
      Ok(tags) => run_trigger.resolve_tag_from(&tags, &pattern),
      Err(e) => tracing::debug!(error = %e, "no tags at HEAD"),
    }
  }
  Ok(decision)
}

/// Check the checkout and open a fresh run with its record saved
pub(crate) fn start_run(
  ctx: &WorkspaceContext,
  config: &RailConfig,
  run_trigger: RunTrigger,
  allow_dirty: bool,
) -> RailResult<(RunContext, RunRecord)> {
  let revision = match SystemGit::open(ctx.workspace_root()) {
    Ok(git) => {
      if !allow_dirty && !git.is_clean()? {
        return Err(
          StageError::Provision {
            step: "checkout".to_string(),
            reason: "working tree has uncommitted changes to tracked files".to_string(),
          }
          .into(),
        );
      }
      Some(git.source_revision()?)
    }
    Err(RailError::Git(e)) => {
      tracing::warn!(error = %e, "workspace is not a git checkout; building without a revision");
      None
    }
    Err(e) => return Err(e),
  };

  let seed = format!("{}:{:?}", config.pipeline.name, run_trigger.tag);
  let run = RunContext::create(&ctx.runs_dir()?, &seed)?;
  let record = RunRecord::new(
    &run.run_id,
    &config.pipeline.name,
    run.created_at,
    run_trigger,
    revision,
  );
  record.save(&run.record_path())?;
  Ok((run, record))
}

/// Release host from config; `repository` comes from `--repository` / GITHUB_REPOSITORY
pub(crate) fn release_host(
  ctx: &WorkspaceContext,
  config: &RailConfig,
  repository: Option<&str>,
) -> RailResult<Box<dyn ReleaseHost>> {
  host::from_config(&config.host, ctx.workspace_root(), repository)
}

/// Read the access token named by `release.token_env`
pub(crate) fn load_credential(config: &RailConfig) -> Option<Credential> {
  let credential = Credential::from_env(&config.release.token_env);
  if credential.is_none() {
    tracing::debug!(var = %config.release.token_env, "no access token in environment");
  }
  credential
}
