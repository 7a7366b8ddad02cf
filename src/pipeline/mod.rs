//! The two-stage release pipeline
//!
//! ```text
//! Build:   runtime -> environment -> install -> scripts -> upload artifact
//! Release: download artifact -> check existing -> create draft release
//! ```
//!
//! Stages run strictly in that order; the release stage never starts unless the
//! run record holds a successful build.

pub mod build;
pub mod plan;
pub mod record;
pub mod release;
pub mod runner;
pub mod step;

pub use plan::PipelinePlan;
pub use record::{RunRecord, RunStatus, StageStatus};
pub use runner::{Pipeline, RunOutcome};
pub use step::SystemStepRunner;
