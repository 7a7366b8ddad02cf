//! Progress indicators for artifact transfers
//!
//! Uses `linya`. Installer archives run to hundreds of megabytes, so uploads and
//! downloads between stages draw a byte-counting bar. Nothing is drawn when stderr
//! is not a terminal (CI logs).

use linya::{Bar, Progress};
use std::io::IsTerminal;

/// Progress bar for copying one artifact
pub struct TransferProgress {
  inner: Option<(Progress, Bar)>,
}

impl TransferProgress {
  /// Create a bar over `total` bytes, or a silent tracker when not on a terminal
  pub fn new(total: u64, label: impl Into<String>) -> Self {
    if !std::io::stderr().is_terminal() || total == 0 {
      return Self { inner: None };
    }
    let mut progress = Progress::new();
    let bar = progress.bar(total as usize, label.into());
    Self {
      inner: Some((progress, bar)),
    }
  }

  /// Advance by `bytes`
  pub fn inc(&mut self, bytes: usize) {
    if let Some((progress, bar)) = self.inner.as_mut() {
      progress.inc_and_draw(bar, bytes);
    }
  }

  #[cfg(test)]
  fn is_visible(&self) -> bool {
    self.inner.is_some()
  }
}
