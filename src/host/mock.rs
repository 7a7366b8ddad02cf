//! In-memory release host that records calls

use super::{DraftRelease, ReleaseHandle, ReleaseHost};
use crate::core::credential::Credential;
use crate::core::error::ReleaseError;
use std::cell::RefCell;

#[derive(Default)]
pub struct MockHost {
  existing: RefCell<Vec<ReleaseHandle>>,
  created: RefCell<Vec<DraftRelease>>,
  fail_create: RefCell<Option<fn() -> ReleaseError>>,
  require_token: bool,
}

impl MockHost {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reject calls without a credential, like a real host
  pub fn requiring_token() -> Self {
    Self {
      require_token: true,
      ..Self::default()
    }
  }

  /// Pretend a release for `tag` already exists
  pub fn with_existing(self, tag: &str) -> Self {
    self.existing.borrow_mut().push(ReleaseHandle {
      id: "existing".to_string(),
      tag: tag.to_string(),
      draft: false,
      prerelease: false,
      url: None,
      assets: vec!["old.7z".to_string()],
    });
    self
  }

  pub fn fail_create_with(self, make: fn() -> ReleaseError) -> Self {
    *self.fail_create.borrow_mut() = Some(make);
    self
  }

  /// Every create call received, in order
  pub fn created(&self) -> Vec<DraftRelease> {
    self.created.borrow().clone()
  }

  pub fn existing(&self) -> Vec<ReleaseHandle> {
    self.existing.borrow().clone()
  }

  fn check_token(&self, credential: Option<&Credential>) -> Result<(), ReleaseError> {
    if self.require_token && credential.is_none() {
      return Err(ReleaseError::Auth {
        reason: "no access token provided".to_string(),
      });
    }
    Ok(())
  }
}

impl ReleaseHost for MockHost {
  fn name(&self) -> &str {
    "mock"
  }

  fn find_release(&self, tag: &str, credential: Option<&Credential>) -> Result<Option<ReleaseHandle>, ReleaseError> {
    self.check_token(credential)?;
    Ok(self.existing.borrow().iter().find(|r| r.tag == tag).cloned())
  }

  fn create_draft_release(
    &self,
    request: &DraftRelease,
    credential: Option<&Credential>,
  ) -> Result<ReleaseHandle, ReleaseError> {
    self.created.borrow_mut().push(request.clone());
    self.check_token(credential)?;
    if let Some(make) = *self.fail_create.borrow() {
      return Err(make());
    }
    Ok(ReleaseHandle {
      id: format!("mock-{}", self.created.borrow().len()),
      tag: request.tag.clone(),
      draft: request.draft,
      prerelease: request.prerelease,
      url: None,
      assets: request
        .files
        .iter()
        .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect(),
    })
  }
}
