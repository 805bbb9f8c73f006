//! Install orchestration: root preparation, per-package steps and the run report.

mod orchestrator;
mod ownership;
mod prepare;
mod report;

pub use orchestrator::InstallOrchestrator;
pub use ownership::apply_owner;
pub use prepare::prepare_root;
pub use report::{
    InstallStats, PackageOutcome, PackageReport, RunReport, SkipReason, write_error,
};
