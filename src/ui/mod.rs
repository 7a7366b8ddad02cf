//! Terminal output helpers

pub mod progress;

use std::sync::atomic::{AtomicBool, Ordering};

static STDOUT_RESERVED: AtomicBool = AtomicBool::new(false);

/// Keep stdout for a single machine-readable document (`--json`). Stage
/// progress and streamed tool output go to stderr from here on.
pub fn reserve_stdout() {
  STDOUT_RESERVED.store(true, Ordering::Relaxed);
}

pub fn stdout_reserved() -> bool {
  STDOUT_RESERVED.load(Ordering::Relaxed)
}

/// `println!` for stage progress; moves to stderr while stdout is reserved
#[macro_export]
macro_rules! say {
  ($($arg:tt)*) => {
    if $crate::ui::stdout_reserved() {
      eprintln!($($arg)*);
    } else {
      println!($($arg)*);
    }
  };
}
