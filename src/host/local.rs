//! Directory-backed release host
//!
//! ```text
//! <dir>/<tag>/release.json
//! <dir>/<tag>/assets/<file>
//! ```

use super::{DraftRelease, ReleaseHandle, ReleaseHost};
use crate::core::credential::Credential;
use crate::core::error::ReleaseError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

const RECORD_FILE: &str = "release.json";

pub struct LocalHost {
  root: PathBuf,
}

impl LocalHost {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn release_dir(&self, tag: &str) -> Result<PathBuf, ReleaseError> {
    if tag.is_empty() || tag.contains(['/', '\\']) || tag == "." || tag == ".." {
      return Err(ReleaseError::Api {
        status: 400,
        message: format!("tag '{}' cannot be stored by the local host", tag),
      });
    }
    Ok(self.root.join(tag))
  }
}

fn io_err(context: &str, err: std::io::Error) -> ReleaseError {
  ReleaseError::Transport {
    message: format!("{}: {}", context, err),
  }
}

impl ReleaseHost for LocalHost {
  fn name(&self) -> &str {
    "local"
  }

  fn find_release(&self, tag: &str, _credential: Option<&Credential>) -> Result<Option<ReleaseHandle>, ReleaseError> {
    let record = self.release_dir(tag)?.join(RECORD_FILE);
    if !record.is_file() {
      return Ok(None);
    }
    let content = fs::read_to_string(&record).map_err(|e| io_err("reading release record", e))?;
    let handle = serde_json::from_str(&content).map_err(|e| ReleaseError::Api {
      status: 500,
      message: format!("corrupt release record {}: {}", record.display(), e),
    })?;
    Ok(Some(handle))
  }

  fn create_draft_release(
    &self,
    request: &DraftRelease,
    _credential: Option<&Credential>,
  ) -> Result<ReleaseHandle, ReleaseError> {
    let dir = self.release_dir(&request.tag)?;
    if dir.join(RECORD_FILE).exists() {
      return Err(ReleaseError::Conflict {
        tag: request.tag.clone(),
      });
    }

    let assets_dir = dir.join("assets");
    fs::create_dir_all(&assets_dir).map_err(|e| io_err("creating release directory", e))?;

    let mut assets = Vec::with_capacity(request.files.len());
    for file in &request.files {
      let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ReleaseError::NoFiles {
          pattern: file.display().to_string(),
        })?;
      fs::copy(file, assets_dir.join(&name)).map_err(|e| io_err(&format!("copying {}", file.display()), e))?;
      assets.push(name);
    }

    let mut hasher = Sha256::new();
    hasher.update(request.tag.as_bytes());
    hasher.update(chrono::Utc::now().to_rfc3339().as_bytes());
    let id = format!("{:x}", hasher.finalize())[..12].to_string();

    let handle = ReleaseHandle {
      id,
      tag: request.tag.clone(),
      draft: request.draft,
      prerelease: request.prerelease,
      url: Some(dir.display().to_string()),
      assets,
    };
    let json = serde_json::to_string_pretty(&handle).map_err(|e| ReleaseError::Api {
      status: 500,
      message: e.to_string(),
    })?;
    fs::write(dir.join(RECORD_FILE), json).map_err(|e| io_err("writing release record", e))?;

    Ok(handle)
  }
}
