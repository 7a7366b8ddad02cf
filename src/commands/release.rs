use super::{load_credential, release_host};
use crate::core::context::{RunContext, WorkspaceContext};
use crate::core::error::RailResult;
use crate::pipeline::{Pipeline, RunRecord, SystemStepRunner};

/// Release stage for an earlier run
///
/// `tag` overrides the tag recorded at trigger time.
pub fn run_release(
  ctx: &WorkspaceContext,
  run_id: &str,
  tag: Option<String>,
  repository: Option<&str>,
) -> RailResult<()> {
  let config = ctx.require_config()?;
  let run = RunContext::open(&ctx.runs_dir()?, run_id)?;
  let mut record = RunRecord::load(&run.record_path())?;

  if let Some(tag) = tag {
    tracing::info!(tag = %tag, "overriding recorded tag");
    record.trigger.tag = Some(tag);
  }

  let host = release_host(ctx, config, repository)?;
  let credential = load_credential(config);

  let runner = SystemStepRunner;
  Pipeline::new(config, ctx.workspace_root(), &runner).release(&run, &mut record, host.as_ref(), credential.as_ref())
}
