pub mod system_git;

pub use system_git::SystemGit;

/// Source revision a run builds from
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceRevision {
  pub sha: String,
  /// Branch name, or "HEAD" when detached (the usual state for tag checkouts)
  pub branch: String,
}
