use super::trigger::print_decision;
use super::{EventArgs, decide, load_credential, release_host, start_run};
use crate::core::context::WorkspaceContext;
use crate::core::error::RailResult;
use crate::pipeline::{Pipeline, PipelinePlan, RunOutcome, SystemStepRunner};
use crate::trigger::TriggerDecision;

/// Flags of `draftrail run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub dry_run: bool,
  pub allow_dirty: bool,
  pub json: bool,
  pub repository: Option<String>,
}

/// Evaluate the trigger, then run build and release
///
/// A skipped trigger is a success. A failed stage returns its error after the
/// run summary is printed.
pub fn run_pipeline(ctx: &WorkspaceContext, args: EventArgs, options: RunOptions) -> RailResult<()> {
  let config = ctx.require_config()?;
  if options.json {
    crate::ui::reserve_stdout();
  }
  let decision = decide(ctx, &args)?;

  let run_trigger = match decision {
    TriggerDecision::Start(run_trigger) => run_trigger,
    TriggerDecision::Skip { reason } => {
      if options.json {
        println!("{}", serde_json::json!({ "started": false, "reason": reason }));
      } else {
        println!("⏸️  Not triggered: {}", reason);
      }
      return Ok(());
    }
  };

  if options.dry_run {
    let plan = PipelinePlan::new(config, ctx.workspace_root(), run_trigger, options.repository.as_deref());
    if options.json {
      println!("{}", plan.to_json()?);
    } else {
      println!("{}", plan.to_human_readable());
      println!("ℹ️  Dry run: nothing was executed");
    }
    return Ok(());
  }

  // Host problems (no repository, bad URL) should surface before a long build
  let host = release_host(ctx, config, options.repository.as_deref())?;
  let credential = load_credential(config);

  print_decision(&TriggerDecision::Start(run_trigger.clone()));
  let (run, record) = start_run(ctx, config, run_trigger, options.allow_dirty)?;
  tracing::info!(run_id = %run.run_id, "run started");
  crate::say!("🆔 Run {}", run.run_id);

  let runner = SystemStepRunner;
  let outcome =
    Pipeline::new(config, ctx.workspace_root(), &runner).run(&run, record, host.as_ref(), credential.as_ref());

  report(&outcome, options.json)?;
  match outcome.error {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

fn report(outcome: &RunOutcome, json: bool) -> RailResult<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(&outcome.record)?);
    return Ok(());
  }

  let record = &outcome.record;
  println!("\n📊 Run {}", record.run_id);
  for (stage, report) in [("build", &record.build), ("release", &record.release)] {
    match report.duration_ms() {
      Some(ms) => println!("   {} {:<8} {} ({} ms)", report.status.icon(), stage, report.status, ms),
      None => println!("   {} {:<8} {}", report.status.icon(), stage, report.status),
    }
  }
  if let Some(note) = &record.release.note {
    println!("      {}", note);
  }
  if outcome.succeeded()
    && let Some(handle) = &record.release_handle
  {
    println!("\n🎉 Draft release {} is ready for review", handle.tag);
  }
  Ok(())
}
