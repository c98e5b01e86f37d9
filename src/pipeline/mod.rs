// ABOUTME: The deployment pipeline: fixed step order, fail-fast halting, and the run report.
// ABOUTME: Exports the controller and the report types it produces.

mod controller;
mod report;

pub use controller::PipelineController;
pub use report::{
    DeploymentReport, FailureKind, PipelineState, ReportStatus, Step, StepFailure, StepOutcome,
    StepResult,
};
