//! Error types for draftrail with contextual messages and exit codes
//!
//! Every failure a run can hit lands in one of a handful of categories. Stage
//! failures (provisioning, dependency install, build scripts, missing artifacts,
//! release creation) are all fatal for the run and share one exit code so CI can
//! tell "the pipeline failed" apart from "draftrail was misconfigured".

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for draftrail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// A pipeline stage failed
  Stage = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for draftrail
#[derive(Debug)]
pub enum RailError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Stage failures (fatal for the run)
  Stage(StageError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl RailError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      RailError::Message { message, context, help } => RailError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      RailError::Io(e) => RailError::Io(io::Error::new(e.kind(), format!("{}: {}", ctx_str, e))),
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      RailError::Config(_) => ExitCode::User,
      RailError::Git(_) => ExitCode::System,
      RailError::Stage(_) => ExitCode::Stage,
      RailError::Io(_) => ExitCode::System,
      RailError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      RailError::Config(e) => e.help_message(),
      RailError::Git(e) => e.help_message(),
      RailError::Stage(e) => e.help_message(),
      RailError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }

  /// Stage failure category, if this error is a stage failure
  pub fn category(&self) -> Option<&'static str> {
    match self {
      RailError::Stage(e) => Some(e.category()),
      _ => None,
    }
  }
}

impl fmt::Display for RailError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RailError::Config(e) => write!(f, "{}", e),
      RailError::Git(e) => write!(f, "{}", e),
      RailError::Stage(e) => write!(f, "{}", e),
      RailError::Io(e) => write!(f, "I/O error: {}", e),
      RailError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for RailError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RailError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for RailError {
  fn from(err: io::Error) -> Self {
    RailError::Io(err)
  }
}

impl From<String> for RailError {
  fn from(msg: String) -> Self {
    RailError::message(msg)
  }
}

impl From<&str> for RailError {
  fn from(msg: &str) -> Self {
    RailError::message(msg)
  }
}

impl From<ConfigError> for RailError {
  fn from(err: ConfigError) -> Self {
    RailError::Config(err)
  }
}

impl From<StageError> for RailError {
  fn from(err: StageError) -> Self {
    RailError::Stage(err)
  }
}

impl From<ReleaseError> for RailError {
  fn from(err: ReleaseError) -> Self {
    RailError::Stage(StageError::Release(err))
  }
}

impl From<toml_edit::de::Error> for RailError {
  fn from(err: toml_edit::de::Error) -> Self {
    RailError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for RailError {
  fn from(err: toml_edit::ser::Error) -> Self {
    RailError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<serde_json::Error> for RailError {
  fn from(err: serde_json::Error) -> Self {
    RailError::message(format!("JSON error: {}", err))
  }
}

impl From<glob::PatternError> for RailError {
  fn from(err: glob::PatternError) -> Self {
    RailError::message(format!("Invalid glob pattern: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// draftrail.toml not found
  NotFound { workspace_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable
  Invalid { field: String, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Run `draftrail init` to create a configuration file.".to_string()),
      ConfigError::MissingField { field } => Some(format!("Add `{}` to draftrail.toml.", field)),
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { workspace_root } => {
        write!(
          f,
          "No draftrail configuration found.\nExpected file: {}/draftrail.toml",
          workspace_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::Invalid { field, reason } => {
        write!(f, "Invalid value for '{}': {}", field, reason)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::RepoNotFound { path } => Some(format!(
        "Run draftrail from a git checkout of the project: {}",
        path.display()
      )),
      GitError::CommandFailed { .. } => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
    }
  }
}

/// Fatal stage failures
#[derive(Debug)]
pub enum StageError {
  /// Runtime or tooling unavailable, or the checkout is unusable
  Provision { step: String, reason: String },

  /// Project dependency installation failed
  DependencyInstall { step: String, reason: String },

  /// Installer or archive script failed
  BuildScript { step: String, reason: String },

  /// Expected artifact absent at upload or download
  ArtifactMissing { name: String, path: PathBuf },

  /// Downloaded artifact does not match the uploaded digest
  ArtifactCorrupt { name: String, expected: String, actual: String },

  /// Release stage refused to run because the build did not succeed
  BuildNotSucceeded { run_id: String },

  /// Release creation failed
  Release(ReleaseError),
}

impl StageError {
  /// Short machine-readable category (stored in run records)
  pub fn category(&self) -> &'static str {
    match self {
      StageError::Provision { .. } => "environment-provision",
      StageError::DependencyInstall { .. } => "dependency-install",
      StageError::BuildScript { .. } => "build-script",
      StageError::ArtifactMissing { .. } | StageError::ArtifactCorrupt { .. } => "artifact-missing",
      StageError::BuildNotSucceeded { .. } => "build-not-succeeded",
      StageError::Release(_) => "release-creation",
    }
  }

  fn help_message(&self) -> Option<String> {
    match self {
      StageError::Provision { .. } => {
        Some("Check that the runtime and tooling named in [[build.steps]] are installed and on PATH.".to_string())
      }
      StageError::ArtifactMissing { path, .. } => Some(format!(
        "The build must leave its archive at {}. Check build.artifact.path and the archive script.",
        path.display()
      )),
      StageError::BuildNotSucceeded { run_id } => Some(format!(
        "Re-run the build (`draftrail build`) before releasing; run {} has no successful build.",
        run_id
      )),
      StageError::Release(e) => e.help_message(),
      _ => None,
    }
  }
}

impl fmt::Display for StageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageError::Provision { step, reason } => {
        write!(f, "Environment provisioning failed at step '{}': {}", step, reason)
      }
      StageError::DependencyInstall { step, reason } => {
        write!(f, "Dependency install failed at step '{}': {}", step, reason)
      }
      StageError::BuildScript { step, reason } => {
        write!(f, "Build script failed at step '{}': {}", step, reason)
      }
      StageError::ArtifactMissing { name, path } => {
        write!(f, "Artifact '{}' not found at {}", name, path.display())
      }
      StageError::ArtifactCorrupt { name, expected, actual } => {
        write!(
          f,
          "Artifact '{}' is corrupt: expected sha256 {}, got {}",
          name, expected, actual
        )
      }
      StageError::BuildNotSucceeded { run_id } => {
        write!(f, "Build stage of run {} did not succeed", run_id)
      }
      StageError::Release(e) => write!(f, "Release creation failed: {}", e),
    }
  }
}

/// Release creation errors reported by a release host
#[derive(Debug)]
pub enum ReleaseError {
  /// No tag could be resolved for the run
  NoTag,

  /// Attachment glob matched nothing
  NoFiles { pattern: String },

  /// Credential missing or rejected
  Auth { reason: String },

  /// A release for the tag already exists
  Conflict { tag: String },

  /// Host answered with an unexpected status
  Api { status: u16, message: String },

  /// Host unreachable
  Transport { message: String },
}

impl ReleaseError {
  fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::NoTag => {
        Some("Push a tag matching the trigger pattern, or pass --tag for a manual dispatch.".to_string())
      }
      ReleaseError::NoFiles { pattern } => Some(format!(
        "Nothing in the downloaded artifact matches '{}'. Check release.files.",
        pattern
      )),
      ReleaseError::Auth { .. } => {
        Some("Export a token with release write access in the variable named by release.token_env.".to_string())
      }
      ReleaseError::Conflict { tag } => Some(format!(
        "Delete the existing release for {} or set release.on_existing = \"skip\".",
        tag
      )),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::NoTag => write!(f, "no release tag for this run"),
      ReleaseError::NoFiles { pattern } => write!(f, "no files match '{}'", pattern),
      ReleaseError::Auth { reason } => write!(f, "authentication failed: {}", reason),
      ReleaseError::Conflict { tag } => write!(f, "a release for tag {} already exists", tag),
      ReleaseError::Api { status, message } => write!(f, "host returned {}: {}", status, message),
      ReleaseError::Transport { message } => write!(f, "host unreachable: {}", message),
    }
  }
}

/// Result type alias for draftrail
pub type RailResult<T> = Result<T, RailError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> RailResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<RailError>,
{
  fn context(self, ctx: impl Into<String>) -> RailResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &RailError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
