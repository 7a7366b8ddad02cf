//! Running external build tools
//!
//! `StepRunner` is the seam between the build stage and the operating system;
//! tests substitute a scripted runner.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A fully expanded program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  /// Capture stdout/stderr instead of streaming them to the terminal
  pub capture: bool,
}

impl Invocation {
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .map(|part| {
        if part.contains(' ') {
          format!("\"{}\"", part)
        } else {
          part.to_string()
        }
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// What a finished invocation reported
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
  pub success: bool,
  pub exit_code: Option<i32>,
  /// Empty unless the invocation was captured
  pub stdout: String,
  pub stderr: String,
}

pub trait StepRunner {
  /// Run to completion. `Err` means the program could not be started at all.
  fn run(&self, invocation: &Invocation) -> io::Result<StepOutput>;
}

/// Runs invocations as child processes
pub struct SystemStepRunner;

impl StepRunner for SystemStepRunner {
  fn run(&self, invocation: &Invocation) -> io::Result<StepOutput> {
    let mut cmd = Command::new(&invocation.program);
    cmd
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .stdin(Stdio::null());

    tracing::debug!(command = %invocation.display(), cwd = %invocation.cwd.display(), "spawning step");

    if invocation.capture {
      let output = cmd.output()?;
      Ok(StepOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      })
    } else {
      // Tool output must not interleave with a --json document on stdout
      let stdout = if crate::ui::stdout_reserved() {
        Stdio::from(io::stderr())
      } else {
        Stdio::inherit()
      };
      let status = cmd.stdout(stdout).stderr(Stdio::inherit()).status()?;
      Ok(StepOutput {
        success: status.success(),
        exit_code: status.code(),
        ..StepOutput::default()
      })
    }
  }
}
