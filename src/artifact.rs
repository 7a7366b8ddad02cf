//! Run-scoped artifact store
//!
//! The build stage "uploads" its archive by copying it into
//! `<run>/artifacts/<name>/` next to a `manifest.json`; the release stage
//! "downloads" it by copying it back out and checking the SHA-256 digest.
//! Transfers are copies, never shared references, so the stages share no
//! mutable state beyond the store itself.

use crate::core::error::{RailError, RailResult, ResultExt, StageError};
use crate::ui::progress::TransferProgress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const CHUNK_SIZE: usize = 1024 * 1024;

/// What was uploaded under a logical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
  pub name: String,
  /// Path the build produced, relative to the workspace
  pub source_path: PathBuf,
  pub file_name: String,
  pub size: u64,
  pub sha256: String,
  pub uploaded_at: DateTime<Utc>,
}

/// Artifact store rooted in a run directory
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn slot(&self, name: &str) -> RailResult<PathBuf> {
    if !is_valid_name(name) {
      return Err(RailError::message(format!(
        "Invalid artifact name '{}': must be a single path component",
        name
      )));
    }
    Ok(self.root.join(name))
  }

  /// Copy `workspace/relative_path` into the store under `name`
  ///
  /// A missing file is an artifact-missing stage failure.
  pub fn upload(&self, name: &str, workspace: &Path, relative_path: &Path) -> RailResult<ArtifactManifest> {
    let source = workspace.join(relative_path);
    if !source.is_file() {
      return Err(
        StageError::ArtifactMissing {
          name: name.to_string(),
          path: relative_path.to_path_buf(),
        }
        .into(),
      );
    }

    let file_name = source
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .ok_or_else(|| StageError::ArtifactMissing {
        name: name.to_string(),
        path: relative_path.to_path_buf(),
      })?;

    let slot = self.slot(name)?;
    if slot.exists() {
      fs::remove_dir_all(&slot).with_context(|| format!("Failed to clear artifact slot {}", slot.display()))?;
    }
    fs::create_dir_all(&slot).with_context(|| format!("Failed to create artifact slot {}", slot.display()))?;

    let (size, sha256) = copy_with_digest(&source, &slot.join(&file_name), &format!("upload {}", name))?;

    let manifest = ArtifactManifest {
      name: name.to_string(),
      source_path: relative_path.to_path_buf(),
      file_name,
      size,
      sha256,
      uploaded_at: Utc::now(),
    };
    fs::write(slot.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)
      .with_context(|| format!("Failed to write manifest for artifact '{}'", name))?;

    tracing::info!(artifact = %name, size = manifest.size, sha256 = %manifest.sha256, "uploaded artifact");
    Ok(manifest)
  }

  /// Manifest of an uploaded artifact, if present
  pub fn manifest(&self, name: &str) -> RailResult<Option<ArtifactManifest>> {
    let path = self.slot(name)?.join(MANIFEST_FILE);
    if !path.is_file() {
      return Ok(None);
    }
    let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(serde_json::from_str(&content)?))
  }

  /// Copy artifact `name` into `dest_dir`, verifying its digest
  pub fn download(&self, name: &str, dest_dir: &Path) -> RailResult<PathBuf> {
    let slot = self.slot(name)?;
    let missing = || StageError::ArtifactMissing {
      name: name.to_string(),
      path: slot.clone(),
    };

    let manifest = self.manifest(name)?.ok_or_else(missing)?;
    let stored = slot.join(&manifest.file_name);
    if !stored.is_file() {
      return Err(missing().into());
    }

    fs::create_dir_all(dest_dir).with_context(|| format!("Failed to create {}", dest_dir.display()))?;
    let dest = dest_dir.join(&manifest.file_name);
    let (_, sha256) = copy_with_digest(&stored, &dest, &format!("download {}", name))?;

    if sha256 != manifest.sha256 {
      let _ = fs::remove_file(&dest);
      return Err(
        StageError::ArtifactCorrupt {
          name: name.to_string(),
          expected: manifest.sha256,
          actual: sha256,
        }
        .into(),
      );
    }

    tracing::info!(artifact = %name, dest = %dest.display(), "downloaded artifact");
    Ok(dest)
  }

  /// Delete the stored archive once it has been attached; the manifest stays
  pub fn discard(&self, name: &str) -> RailResult<()> {
    let slot = self.slot(name)?;
    let Some(manifest) = self.manifest(name)? else {
      return Ok(());
    };
    let stored = slot.join(&manifest.file_name);
    if stored.is_file() {
      fs::remove_file(&stored).with_context(|| format!("Failed to discard {}", stored.display()))?;
      tracing::info!(artifact = %name, "discarded consumed artifact");
    }
    Ok(())
  }
}

/// Artifact names become directory names in the store: exactly one normal component
pub fn is_valid_name(name: &str) -> bool {
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(c)), None) if c == name
  )
}

/// Copy `from` to `to` in chunks, hashing as we go. Returns (bytes, sha256 hex).
fn copy_with_digest(from: &Path, to: &Path, label: &str) -> RailResult<(u64, String)> {
  let mut reader = File::open(from).with_context(|| format!("Failed to open {}", from.display()))?;
  let total = reader.metadata().map(|m| m.len()).unwrap_or(0);
  let mut writer = File::create(to).with_context(|| format!("Failed to create {}", to.display()))?;

  let mut hasher = Sha256::new();
  let mut progress = TransferProgress::new(total, label);
  let mut buf = vec![0u8; CHUNK_SIZE];
  let mut copied = 0u64;

  loop {
    let n = reader
      .read(&mut buf)
      .with_context(|| format!("Failed to read {}", from.display()))?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
    writer
      .write_all(&buf[..n])
      .with_context(|| format!("Failed to write {}", to.display()))?;
    copied += n as u64;
    progress.inc(n);
  }
  writer.flush()?;

  Ok((copied, format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::error::RailError;
  use tempfile::TempDir;

  fn workspace_with_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("dist")).unwrap();
    fs::write(dir.path().join("dist/app.7z"), b"7z-bytes").unwrap();
    dir
  }

  #[test]
  fn test_upload_then_download_copies_and_verifies() {
    let ws = workspace_with_archive();
    let run = TempDir::new().unwrap();
    let store = ArtifactStore::new(run.path().join("artifacts"));

    let manifest = store.upload("installer", ws.path(), Path::new("dist/app.7z")).unwrap();
    assert_eq!(manifest.file_name, "app.7z");
    assert_eq!(manifest.size, 8);
    assert_eq!(manifest.sha256.len(), 64);

    // The workspace copy can go away; the store holds its own.
    fs::remove_file(ws.path().join("dist/app.7z")).unwrap();

    let dest = store.download("installer", &run.path().join("download")).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), b"7z-bytes");
    assert_eq!(store.manifest("installer").unwrap(), Some(manifest));
  }

  #[test]
  fn test_upload_missing_file_is_artifact_missing() {
    let ws = TempDir::new().unwrap();
    let store = ArtifactStore::new(ws.path().join("artifacts"));
    let err = store.upload("installer", ws.path(), Path::new("dist/app.7z")).unwrap_err();
    assert_eq!(err.category(), Some("artifact-missing"));
  }

  #[test]
  fn test_download_unknown_name_is_artifact_missing() {
    let run = TempDir::new().unwrap();
    let store = ArtifactStore::new(run.path().join("artifacts"));
    let err = store.download("installer", &run.path().join("download")).unwrap_err();
    assert!(matches!(err, RailError::Stage(StageError::ArtifactMissing { .. })));
  }

  #[test]
  fn test_path_like_names_are_refused() {
    let ws = workspace_with_archive();
    let run = TempDir::new().unwrap();
    fs::write(run.path().join("run.json"), b"{}").unwrap();
    let store = ArtifactStore::new(run.path().join("artifacts"));

    for name in ["..", ".", "../..", "a/b", "", "/abs"] {
      assert!(store.upload(name, ws.path(), Path::new("dist/app.7z")).is_err(), "{:?}", name);
    }
    assert!(run.path().join("run.json").is_file());
    assert!(is_valid_name("installer"));
  }

  #[test]
  fn test_discard_keeps_manifest_only() {
    let ws = workspace_with_archive();
    let run = TempDir::new().unwrap();
    let store = ArtifactStore::new(run.path().join("artifacts"));
    store.upload("installer", ws.path(), Path::new("dist/app.7z")).unwrap();

    store.discard("installer").unwrap();
    assert!(!run.path().join("artifacts/installer/app.7z").exists());
    assert!(store.manifest("installer").unwrap().is_some());

    let err = store.download("installer", &run.path().join("download")).unwrap_err();
    assert_eq!(err.category(), Some("artifact-missing"));
  }

  #[test]
  fn test_tampered_artifact_is_rejected() {
    let ws = workspace_with_archive();
    let run = TempDir::new().unwrap();
    let store = ArtifactStore::new(run.path().join("artifacts"));
    store.upload("installer", ws.path(), Path::new("dist/app.7z")).unwrap();

    fs::write(run.path().join("artifacts/installer/app.7z"), b"tampered").unwrap();
    let err = store.download("installer", &run.path().join("download")).unwrap_err();
    assert!(matches!(err, RailError::Stage(StageError::ArtifactCorrupt { .. })));
    assert!(!run.path().join("download/app.7z").exists());
  }
}
