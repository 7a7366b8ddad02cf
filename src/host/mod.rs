//! Release hosts
//!
//! The release stage only needs two capabilities from the platform that stores
//! releases: look up a release by tag, and create a draft release with files
//! attached. `ReleaseHost` is that seam. Implementations:
//!
//! - **github**: GitHub REST API
//! - **local**: directory-backed host for dry runs and end-to-end tests
//!
//! The access token is a parameter of each call, never looked up by the host.

pub mod github;
pub mod local;
#[cfg(test)]
pub mod mock;

use crate::core::config::HostConfig;
use crate::core::credential::Credential;
use crate::core::error::{ReleaseError, RailResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use github::GithubHost;
pub use local::LocalHost;

/// Request to create a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRelease {
  pub tag: String,
  pub name: String,
  pub files: Vec<PathBuf>,
  pub draft: bool,
  pub prerelease: bool,
}

impl DraftRelease {
  /// Draft, non-prerelease release named after its tag
  pub fn new(tag: impl Into<String>, files: Vec<PathBuf>) -> Self {
    let tag = tag.into();
    Self {
      name: tag.clone(),
      tag,
      files,
      draft: true,
      prerelease: false,
    }
  }
}

/// A release as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseHandle {
  pub id: String,
  pub tag: String,
  pub draft: bool,
  pub prerelease: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default)]
  pub assets: Vec<String>,
}

/// Capability interface of a release-hosting platform
pub trait ReleaseHost {
  /// Short name for logs
  fn name(&self) -> &str;

  /// Release (draft or not) carrying `tag`, if any
  fn find_release(&self, tag: &str, credential: Option<&Credential>) -> Result<Option<ReleaseHandle>, ReleaseError>;

  /// Create a new release and attach `request.files`
  fn create_draft_release(
    &self,
    request: &DraftRelease,
    credential: Option<&Credential>,
  ) -> Result<ReleaseHandle, ReleaseError>;
}

/// Build the host named by config
///
/// `repository_override` wins over `host.repository` for GitHub (e.g. `--repository`
/// or `GITHUB_REPOSITORY` passed in by the caller).
pub fn from_config(
  config: &HostConfig,
  workspace: &Path,
  repository_override: Option<&str>,
) -> RailResult<Box<dyn ReleaseHost>> {
  match config {
    HostConfig::Github { repository, api_url } => {
      let repository = repository_override
        .map(str::to_string)
        .or_else(|| repository.clone())
        .ok_or_else(|| {
          crate::core::error::RailError::with_help(
            "No GitHub repository configured",
            "Set host.repository = \"owner/name\" in draftrail.toml or pass --repository (GITHUB_REPOSITORY).",
          )
        })?;
      crate::core::config::validate_repository(&repository)?;
      Ok(Box::new(GithubHost::new(api_url, &repository)?))
    }
    HostConfig::Local { dir } => Ok(Box::new(LocalHost::new(workspace.join(dir)))),
  }
}

/// Human label of a host config, for plans
pub fn describe(config: &HostConfig, repository_override: Option<&str>) -> String {
  match config {
    HostConfig::Github { repository, .. } => format!(
      "github ({})",
      repository_override
        .or(repository.as_deref())
        .unwrap_or("<repository not set>")
    ),
    HostConfig::Local { dir } => format!("local ({})", dir.display()),
  }
}
