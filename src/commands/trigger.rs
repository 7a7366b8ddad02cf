use serde::Serialize;

use super::{EventArgs, decide};
use crate::core::context::WorkspaceContext;
use crate::core::error::RailResult;
use crate::trigger::{RunTrigger, TriggerDecision};

#[derive(Debug, Serialize)]
struct DecisionReport<'a> {
  starts: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  trigger: Option<&'a RunTrigger>,
  #[serde(skip_serializing_if = "Option::is_none")]
  reason: Option<&'a str>,
}

/// Print whether the event would start a run. Never fails on a skip.
pub fn run_trigger(ctx: &WorkspaceContext, args: EventArgs, json: bool) -> RailResult<()> {
  let decision = decide(ctx, &args)?;

  if json {
    let (trigger, reason) = match &decision {
      TriggerDecision::Start(trigger) => (Some(trigger), None),
      TriggerDecision::Skip { reason } => (None, Some(reason.as_str())),
    };
    let report = DecisionReport {
      starts: decision.starts(),
      trigger,
      reason,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  print_decision(&decision);
  Ok(())
}

pub(crate) fn print_decision(decision: &TriggerDecision) {
  match decision {
    TriggerDecision::Start(trigger) => {
      crate::say!("▶️  Run starts ({})", trigger.event);
      match &trigger.tag {
        Some(tag) => crate::say!("   Tag: {}", tag),
        None => crate::say!("   Tag: <none>; the release stage will fail without one"),
      }
    }
    TriggerDecision::Skip { reason } => {
      crate::say!("⏸️  Not triggered: {}", reason);
    }
  }
}
