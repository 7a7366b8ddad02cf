//! Trigger evaluation: decide whether an event starts a run
//!
//! A run starts for exactly two kinds of events:
//!
//! - a push whose ref is a tag matching the configured pattern (default `v*`)
//! - a manual dispatch
//!
//! Branch pushes, pull requests, schedules and anything unknown are skipped.
//! Event names follow GitHub's (`push`, `workflow_dispatch`, ...) so the values of
//! `GITHUB_EVENT_NAME` / `GITHUB_REF` can be passed straight through.

use crate::core::error::{ConfigError, RailResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event that asked for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Push,
  WorkflowDispatch,
  Other(String),
}

impl EventKind {
  pub fn parse(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
      "push" => EventKind::Push,
      "workflow_dispatch" | "dispatch" | "manual" => EventKind::WorkflowDispatch,
      _ => EventKind::Other(name.trim().to_string()),
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EventKind::Push => write!(f, "push"),
      EventKind::WorkflowDispatch => write!(f, "workflow_dispatch"),
      EventKind::Other(name) => write!(f, "{}", name),
    }
  }
}

/// A git ref as delivered with the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum GitRef {
  Tag(String),
  Branch(String),
  Other(String),
}

impl GitRef {
  /// Parse `refs/tags/..`, `refs/heads/..`; a bare name is taken as a tag
  pub fn parse(reference: &str) -> Self {
    let reference = reference.trim();
    if let Some(tag) = reference.strip_prefix("refs/tags/") {
      GitRef::Tag(tag.to_string())
    } else if let Some(branch) = reference.strip_prefix("refs/heads/") {
      GitRef::Branch(branch.to_string())
    } else if reference.starts_with("refs/") {
      GitRef::Other(reference.to_string())
    } else {
      GitRef::Tag(reference.to_string())
    }
  }

  pub fn tag(&self) -> Option<&str> {
    match self {
      GitRef::Tag(tag) => Some(tag),
      _ => None,
    }
  }
}

impl fmt::Display for GitRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitRef::Tag(tag) => write!(f, "refs/tags/{}", tag),
      GitRef::Branch(branch) => write!(f, "refs/heads/{}", branch),
      GitRef::Other(other) => write!(f, "{}", other),
    }
  }
}

/// An incoming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
  pub kind: EventKind,
  pub git_ref: Option<GitRef>,
}

impl TriggerEvent {
  pub fn parse(event_name: &str, reference: Option<&str>) -> Self {
    Self {
      kind: EventKind::parse(event_name),
      git_ref: reference.filter(|r| !r.trim().is_empty()).map(GitRef::parse),
    }
  }
}

/// Tag glob that push events must match
#[derive(Debug, Clone)]
pub struct TagPattern(glob::Pattern);

impl TagPattern {
  pub fn new(pattern: &str) -> RailResult<Self> {
    glob::Pattern::new(pattern).map(Self).map_err(|e| {
      ConfigError::Invalid {
        field: "pipeline.tag_pattern".to_string(),
        reason: e.to_string(),
      }
      .into()
    })
  }

  pub fn matches(&self, tag: &str) -> bool {
    self.0.matches(tag)
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

/// What started the run; stored in the run record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTrigger {
  pub event: EventKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub git_ref: Option<GitRef>,
  /// Release tag, if one could be resolved yet
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
}

impl RunTrigger {
  pub fn is_manual(&self) -> bool {
    self.event == EventKind::WorkflowDispatch
  }

  /// Fill in the tag of a manual dispatch from the tags at HEAD
  ///
  /// The first tag matching the pattern wins. Push triggers always carry their tag.
  pub fn resolve_tag_from(&mut self, tags_at_head: &[String], pattern: &TagPattern) {
    if self.tag.is_none() {
      self.tag = tags_at_head.iter().find(|t| pattern.matches(t)).cloned();
    }
  }

  /// Semver version encoded in the tag (`v1.2.0` -> 1.2.0), if any
  pub fn version(&self) -> Option<semver::Version> {
    let tag = self.tag.as_deref()?;
    semver::Version::parse(tag.trim_start_matches('v')).ok()
  }
}

/// Outcome of evaluating an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
  Start(RunTrigger),
  Skip { reason: String },
}

impl TriggerDecision {
  pub fn starts(&self) -> bool {
    matches!(self, TriggerDecision::Start(_))
  }
}

/// Decide whether `event` starts a run
///
/// `explicit_tag` is only honoured for manual dispatch. Every tag a run is
/// started with matches `pattern`: a non-matching `explicit_tag` skips the
/// dispatch, a non-matching tag ref is ignored so the tag at HEAD can be used.
pub fn evaluate(event: &TriggerEvent, pattern: &TagPattern, explicit_tag: Option<&str>) -> TriggerDecision {
  match &event.kind {
    EventKind::Push => match &event.git_ref {
      Some(GitRef::Tag(tag)) if pattern.matches(tag) => TriggerDecision::Start(RunTrigger {
        event: EventKind::Push,
        git_ref: event.git_ref.clone(),
        tag: Some(tag.clone()),
      }),
      Some(GitRef::Tag(tag)) => TriggerDecision::Skip {
        reason: format!("tag '{}' does not match '{}'", tag, pattern.as_str()),
      },
      Some(other) => TriggerDecision::Skip {
        reason: format!("push to {} is not a tag push", other),
      },
      None => TriggerDecision::Skip {
        reason: "push event without a ref".to_string(),
      },
    },
    EventKind::WorkflowDispatch => {
      if let Some(tag) = explicit_tag
        && !pattern.matches(tag)
      {
        return TriggerDecision::Skip {
          reason: format!("tag '{}' does not match '{}'", tag, pattern.as_str()),
        };
      }
      let tag = explicit_tag.map(str::to_string).or_else(|| {
        event
          .git_ref
          .as_ref()
          .and_then(|r| r.tag())
          .filter(|t| pattern.matches(t))
          .map(str::to_string)
      });
      TriggerDecision::Start(RunTrigger {
        event: EventKind::WorkflowDispatch,
        git_ref: event.git_ref.clone(),
        tag,
      })
    }
    EventKind::Other(name) => TriggerDecision::Skip {
      reason: format!("event '{}' does not trigger this pipeline", name),
    },
  }
}
