use super::trigger::print_decision;
use super::{EventArgs, decide, start_run};
use crate::core::context::WorkspaceContext;
use crate::core::error::RailResult;
use crate::pipeline::{Pipeline, SystemStepRunner};
use crate::trigger::TriggerDecision;

/// Build stage only, in a fresh run. Prints the run id for `draftrail release --run`.
pub fn run_build(ctx: &WorkspaceContext, args: EventArgs, allow_dirty: bool) -> RailResult<()> {
  let config = ctx.require_config()?;

  let run_trigger = match decide(ctx, &args)? {
    TriggerDecision::Start(run_trigger) => run_trigger,
    skip => {
      print_decision(&skip);
      return Ok(());
    }
  };

  let (run, mut record) = start_run(ctx, config, run_trigger, allow_dirty)?;
  println!("🆔 Run {}", run.run_id);

  let runner = SystemStepRunner;
  Pipeline::new(config, ctx.workspace_root(), &runner).build(&run, &mut record)?;

  println!("\n🚀 Next: draftrail release --run {}", run.run_id);
  Ok(())
}
