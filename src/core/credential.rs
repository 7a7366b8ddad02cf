//! Access token for the release host
//!
//! The token is read once at the command edge and handed to the release call as
//! a parameter. `Debug` and `Display` print `***` and it is never serialized.

use std::fmt;

/// Opaque access token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
  /// Wrap a token; blank tokens are treated as absent
  pub fn new(token: impl Into<String>) -> Option<Self> {
    let token = token.into();
    let trimmed = token.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(Self(trimmed.to_string()))
    }
  }

  /// Read the token from the named environment variable
  pub fn from_env(var: &str) -> Option<Self> {
    std::env::var(var).ok().and_then(Self::new)
  }

  /// Raw token, for building the Authorization header only
  pub(crate) fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Credential(***)")
  }
}

impl fmt::Display for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "***")
  }
}
