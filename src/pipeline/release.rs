//! Release stage: fetch the build artifact and publish a draft release

use crate::artifact::ArtifactStore;
use crate::core::config::{ExistingReleasePolicy, ReleaseConfig};
use crate::core::credential::Credential;
use crate::core::error::{RailResult, ReleaseError, StageError};
use crate::host::{DraftRelease, ReleaseHandle, ReleaseHost};
use std::path::{Path, PathBuf};

/// What the release stage did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
  /// A new draft release was created
  Created(ReleaseHandle),
  /// A release for the tag already existed and was left alone
  Existing(ReleaseHandle),
}

pub struct ReleaseStage<'a> {
  config: &'a ReleaseConfig,
  artifact_name: &'a str,
  host: &'a dyn ReleaseHost,
}

impl<'a> ReleaseStage<'a> {
  pub fn new(config: &'a ReleaseConfig, artifact_name: &'a str, host: &'a dyn ReleaseHost) -> Self {
    Self {
      config,
      artifact_name,
      host,
    }
  }

  pub fn execute(
    &self,
    store: &ArtifactStore,
    download_dir: &Path,
    tag: Option<&str>,
    credential: Option<&Credential>,
  ) -> RailResult<ReleaseOutcome> {
    let tag = tag.ok_or(StageError::Release(ReleaseError::NoTag))?;

    crate::say!("📥 Downloading artifact '{}'", self.artifact_name);
    store.download(self.artifact_name, download_dir)?;
    let outcome = self.publish(download_dir, tag, credential);

    if let Err(e) = std::fs::remove_dir_all(download_dir) {
      tracing::warn!(dir = %download_dir.display(), error = %e, "failed to discard downloaded artifact");
    }
    // The stored archive stays unless a release was created
    if let Ok(ReleaseOutcome::Created(_)) = &outcome
      && let Err(e) = store.discard(self.artifact_name)
    {
      tracing::warn!(artifact = %self.artifact_name, error = %e, "failed to discard released artifact");
    }
    outcome
  }

  fn publish(&self, download_dir: &Path, tag: &str, credential: Option<&Credential>) -> RailResult<ReleaseOutcome> {
    let files = collect_files(download_dir, &self.config.files)?;

    crate::say!("🔍 Checking {} for an existing release {}", self.host.name(), tag);
    if let Some(existing) = self.host.find_release(tag, credential).map_err(StageError::Release)? {
      return match self.config.on_existing {
        ExistingReleasePolicy::Fail => Err(StageError::Release(ReleaseError::Conflict { tag: tag.to_string() }).into()),
        ExistingReleasePolicy::Skip => {
          tracing::warn!(tag, release_id = %existing.id, "release already exists, leaving it untouched");
          Ok(ReleaseOutcome::Existing(existing))
        }
      };
    }

    let request = DraftRelease::new(tag, files);
    crate::say!(
      "🚀 Creating draft release {} with {} file(s)",
      request.tag,
      request.files.len()
    );
    let handle = self
      .host
      .create_draft_release(&request, credential)
      .map_err(StageError::Release)?;
    tracing::info!(tag, release_id = %handle.id, host = self.host.name(), "draft release created");
    Ok(ReleaseOutcome::Created(handle))
  }
}

/// Files in `dir` matching `pattern`, sorted
fn collect_files(dir: &Path, pattern: &str) -> RailResult<Vec<PathBuf>> {
  let base = glob::Pattern::escape(&dir.to_string_lossy());
  let full = format!("{}/{}", base, pattern);

  let mut files: Vec<PathBuf> = glob::glob(&full)?
    .filter_map(Result::ok)
    .filter(|p| p.is_file())
    .collect();
  files.sort();

  if files.is_empty() {
    return Err(
      StageError::Release(ReleaseError::NoFiles {
        pattern: pattern.to_string(),
      })
      .into(),
    );
  }
  Ok(files)
}
