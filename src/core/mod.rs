//! Core engine for draftrail
//!
//! - **config**: draftrail.toml parsing and validation
//! - **context**: workspace context (built once) and isolated run contexts
//! - **credential**: redacted access token passed to the release host
//! - **error**: error taxonomy with exit codes and help messages
//! - **vcs**: read-only git queries (SystemGit)

pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod vcs;
