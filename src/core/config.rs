use crate::core::error::{ConfigError, RailError, RailResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Configuration for draftrail
/// Searched in order: draftrail.toml, .draftrail.toml, .config/draftrail.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailConfig {
  #[serde(default)]
  pub pipeline: PipelineConfig,
  pub build: BuildConfig,
  #[serde(default)]
  pub release: ReleaseConfig,
  #[serde(default)]
  pub host: HostConfig,
}

/// Pipeline-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
  /// Display name of the pipeline
  #[serde(default = "default_pipeline_name")]
  pub name: String,

  /// Tag glob a push must match to start a run (default: "v*")
  #[serde(default = "default_tag_pattern")]
  pub tag_pattern: String,

  /// Where run directories live, relative to the workspace root
  #[serde(default = "default_runs_dir")]
  pub runs_dir: PathBuf,
}

fn default_pipeline_name() -> String {
  "windows-installer".to_string()
}

fn default_tag_pattern() -> String {
  "v*".to_string()
}

fn default_runs_dir() -> PathBuf {
  PathBuf::from(".draftrail").join("runs")
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      name: default_pipeline_name(),
      tag_pattern: default_tag_pattern(),
      runs_dir: default_runs_dir(),
    }
  }
}

/// Build stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
  /// Directory of the isolated dependency environment (relative to workspace)
  #[serde(default = "default_env_dir")]
  pub env_dir: PathBuf,

  pub artifact: ArtifactConfig,

  #[serde(default)]
  pub steps: Vec<StepConfig>,
}

fn default_env_dir() -> PathBuf {
  PathBuf::from("venv")
}

/// The single archive the build hands to the release stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
  /// Logical name used for upload/download
  #[serde(default = "default_artifact_name")]
  pub name: String,

  /// Fixed relative path the build must produce (must end in .7z)
  pub path: PathBuf,
}

fn default_artifact_name() -> String {
  "installer".to_string()
}

/// One external tool invocation in the build stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
  pub name: String,
  pub kind: StepKind,
  /// argv; `{env_python}` and `{workspace}` are expanded
  pub run: Vec<String>,
  /// For runtime steps: version prefix the program must report
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expect_version: Option<String>,
}

/// What a build step does, which decides how its failure is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
  /// Acquire or verify a language runtime
  Runtime,
  /// Create the isolated dependency environment
  Environment,
  /// Install project dependencies and packaging tools
  Install,
  /// Installer generation or archive assembly
  Script,
}

impl std::fmt::Display for StepKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StepKind::Runtime => write!(f, "runtime"),
      StepKind::Environment => write!(f, "environment"),
      StepKind::Install => write!(f, "install"),
      StepKind::Script => write!(f, "script"),
    }
  }
}

/// Release stage configuration
///
/// Draft and prerelease flags are not configurable: every release this tool
/// creates is `draft = true, prerelease = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
  /// Glob of files to attach, relative to the downloaded artifact directory
  #[serde(default = "default_release_files")]
  pub files: String,

  /// What to do when a release for the tag already exists
  #[serde(default)]
  pub on_existing: ExistingReleasePolicy,

  /// Environment variable holding the access token
  #[serde(default = "default_token_env")]
  pub token_env: String,
}

fn default_release_files() -> String {
  "*.7z".to_string()
}

fn default_token_env() -> String {
  "GITHUB_TOKEN".to_string()
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      files: default_release_files(),
      on_existing: ExistingReleasePolicy::default(),
      token_env: default_token_env(),
    }
  }
}

/// Policy for a tag that already has a release. Neither option modifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExistingReleasePolicy {
  /// Fail the release stage with a conflict
  #[default]
  Fail,
  /// Leave the existing release alone and mark the stage skipped
  Skip,
}

/// Where releases are published
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostConfig {
  /// GitHub REST API
  Github {
    /// "owner/name"; falls back to GITHUB_REPOSITORY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repository: Option<String>,
    #[serde(default = "default_api_url")]
    api_url: String,
  },
  /// Directory-backed host
  Local {
    #[serde(default = "default_local_dir")]
    dir: PathBuf,
  },
}

fn default_api_url() -> String {
  "https://api.github.com".to_string()
}

fn default_local_dir() -> PathBuf {
  PathBuf::from(".draftrail").join("releases")
}

impl Default for HostConfig {
  fn default() -> Self {
    HostConfig::Github {
      repository: None,
      api_url: default_api_url(),
    }
  }
}

impl RailConfig {
  /// Find config file in search order: draftrail.toml, .draftrail.toml, .config/draftrail.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("draftrail.toml"),
      path.join(".draftrail.toml"),
      path.join(".config").join("draftrail.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load and validate config (searches multiple locations)
  pub fn load(path: &Path) -> RailResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      RailError::Config(ConfigError::NotFound {
        workspace_root: path.to_path_buf(),
      })
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config = Self::parse(&content).with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    Ok(config)
  }

  /// Parse and validate config text
  pub fn parse(content: &str) -> RailResult<Self> {
    let config: RailConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Save config to draftrail.toml (default location)
  pub fn save(&self, path: &Path) -> RailResult<()> {
    let config_path = path.join("draftrail.toml");
    let content = toml_edit::ser::to_string_pretty(self).context("Failed to serialize config to TOML")?;
    fs::write(&config_path, content).with_context(|| format!("Failed to write config to {}", config_path.display()))?;
    Ok(())
  }

  /// Check if config exists at the given path
  pub fn exists(path: &Path) -> bool {
    Self::find_config_path(path).is_some()
  }

  /// Validate the whole configuration
  pub fn validate(&self) -> RailResult<()> {
    glob::Pattern::new(&self.pipeline.tag_pattern).map_err(|e| invalid("pipeline.tag_pattern", e.to_string()))?;
    glob::Pattern::new(&self.release.files).map_err(|e| invalid("release.files", e.to_string()))?;

    if self.release.token_env.trim().is_empty() {
      return Err(ConfigError::MissingField {
        field: "release.token_env".to_string(),
      }
      .into());
    }

    self.build.validate()?;
    self.host.validate()
  }
}

impl BuildConfig {
  /// Validate artifact contract and steps
  pub fn validate(&self) -> RailResult<()> {
    if !crate::artifact::is_valid_name(&self.artifact.name) {
      return Err(invalid(
        "build.artifact.name",
        format!(
          "'{}' must be a plain name without path separators, '.' or '..'",
          self.artifact.name
        ),
      ));
    }

    let path = &self.artifact.path;
    if path.extension().and_then(|e| e.to_str()) != Some("7z") {
      return Err(invalid(
        "build.artifact.path",
        format!("'{}' must end in .7z", path.display()),
      ));
    }
    if !is_plain_relative(path) {
      return Err(invalid(
        "build.artifact.path",
        format!("'{}' must be relative to the workspace and must not contain '..'", path.display()),
      ));
    }
    if path.parent().is_none_or(|p| p.as_os_str().is_empty()) {
      return Err(invalid(
        "build.artifact.path",
        format!("'{}' must live under an output directory (e.g. dist/)", path.display()),
      ));
    }

    if self.steps.is_empty() {
      return Err(RailError::with_help(
        "Build stage has no steps",
        "Add at least one [[build.steps]] entry to draftrail.toml",
      ));
    }

    for step in &self.steps {
      if step.run.is_empty() || step.run[0].trim().is_empty() {
        return Err(invalid(
          &format!("build.steps '{}'.run", step.name),
          "must name a program",
        ));
      }
      if step.expect_version.is_some() && step.kind != StepKind::Runtime {
        return Err(invalid(
          &format!("build.steps '{}'.expect_version", step.name),
          "only runtime steps can expect a version",
        ));
      }
    }

    Ok(())
  }
}

impl HostConfig {
  fn validate(&self) -> RailResult<()> {
    match self {
      HostConfig::Github { repository, api_url } => {
        if let Some(repo) = repository {
          validate_repository(repo)?;
        }
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
          return Err(invalid("host.api_url", format!("'{}' is not an http(s) URL", api_url)));
        }
        Ok(())
      }
      HostConfig::Local { .. } => Ok(()),
    }
  }
}

/// Check an "owner/name" repository slug
pub fn validate_repository(repo: &str) -> RailResult<()> {
  let mut parts = repo.split('/');
  match (parts.next(), parts.next(), parts.next()) {
    (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
    _ => Err(invalid("host.repository", format!("'{}' is not of the form owner/name", repo))),
  }
}

fn is_plain_relative(path: &Path) -> bool {
  path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn invalid(field: &str, reason: impl Into<String>) -> RailError {
  RailError::Config(ConfigError::Invalid {
    field: field.to_string(),
    reason: reason.into(),
  })
}

/// Default configuration mirroring the Windows installer pipeline
pub fn default_config() -> RailConfig {
  let step = |name: &str, kind: StepKind, run: &[&str]| StepConfig {
    name: name.to_string(),
    kind,
    run: run.iter().map(|s| s.to_string()).collect(),
    expect_version: None,
  };

  let mut runtime = step("Set up Python", StepKind::Runtime, &["python", "--version"]);
  runtime.expect_version = Some("3.10".to_string());

  RailConfig {
    pipeline: PipelineConfig::default(),
    build: BuildConfig {
      env_dir: default_env_dir(),
      artifact: ArtifactConfig {
        name: default_artifact_name(),
        path: PathBuf::from("dist").join("image_ai_utils_windows.7z"),
      },
      steps: vec![
        runtime,
        step(
          "Create virtual environment",
          StepKind::Environment,
          &["python", "-m", "venv", "venv"],
        ),
        step(
          "Install dependencies",
          StepKind::Install,
          &[
            "{env_python}",
            "-m",
            "pip",
            "install",
            "-r",
            "requirements.txt",
            "pyinstaller",
          ],
        ),
        step(
          "Build installer",
          StepKind::Script,
          &["{env_python}", "build_windows_installer.py"],
        ),
        step(
          "Assemble archive",
          StepKind::Script,
          &["{env_python}", "pack_windows_archive.py"],
        ),
      ],
    },
    release: ReleaseConfig::default(),
    host: HostConfig::default(),
  }
}
