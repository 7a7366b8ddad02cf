use std::path::PathBuf;

use crate::core::config::{HostConfig, RailConfig, default_config};
use crate::core::context::WorkspaceContext;
use crate::core::error::{RailError, RailResult};

/// Write a default draftrail.toml for the Windows installer pipeline
///
/// `local` configures the directory-backed release host instead of GitHub.
pub fn run_init(ctx: &WorkspaceContext, force: bool, local: bool) -> RailResult<()> {
  let root = ctx.workspace_root();

  if let Some(existing) = RailConfig::find_config_path(root)
    && !force
  {
    return Err(RailError::with_help(
      format!("Configuration already exists at {}", existing.display()),
      "Pass --force to overwrite it.",
    ));
  }

  let mut config = default_config();
  if local {
    config.host = HostConfig::Local {
      dir: PathBuf::from(".draftrail").join("releases"),
    };
  }

  println!("💾 Writing configuration...");
  config.save(root)?;

  println!("\n✅ Initialized draftrail");
  println!("   Configuration saved to: {}", root.join("draftrail.toml").display());
  println!("\n🚀 Next steps:");
  if !local {
    println!("   1. Set host.repository = \"owner/name\" (or export GITHUB_REPOSITORY)");
    println!("   2. Export {} with release write access", config.release.token_env);
  }
  println!("   Review [[build.steps]], then preview with: draftrail run --dry-run");

  Ok(())
}
