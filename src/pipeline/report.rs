// ABOUTME: What a pipeline run produced: per-step results, final state, and overall status.
// ABOUTME: The report is serializable and decides the process exit code.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::StepTimeouts;
use crate::credentials::CredentialError;
use crate::deploy::{MigrationError, PullError, ReclaimError, StartupError, TeardownError};
use crate::diagnostics::Warning;
use crate::error::{EXIT_CONFIG, EXIT_DEGRADED, EXIT_FAILED, EXIT_OK};
use crate::types::StackName;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Authenticating,
    Fetching,
    TearingDown,
    Migrating,
    Starting,
    Reclaiming,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Authenticating,
        Step::Fetching,
        Step::TearingDown,
        Step::Migrating,
        Step::Starting,
        Step::Reclaiming,
    ];

    /// Failure kind used when the step times out or is cancelled.
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Step::Authenticating => FailureKind::AuthenticationFailed,
            Step::Fetching => FailureKind::PullError,
            Step::TearingDown => FailureKind::TeardownError,
            Step::Migrating => FailureKind::MigrationError,
            Step::Starting => FailureKind::StartupError,
            Step::Reclaiming => FailureKind::ReclaimError,
        }
    }

    pub fn timeout(self, timeouts: &StepTimeouts) -> Option<Duration> {
        match self {
            Step::Authenticating => timeouts.login,
            Step::Fetching => timeouts.pull,
            Step::TearingDown => timeouts.teardown,
            Step::Migrating => timeouts.migrate,
            Step::Starting => timeouts.start,
            Step::Reclaiming => timeouts.reclaim,
        }
    }

    /// Human description for progress output.
    pub fn label(self) -> &'static str {
        match self {
            Step::Authenticating => "Authenticating to registry",
            Step::Fetching => "Pulling images",
            Step::TearingDown => "Tearing down running stack",
            Step::Migrating => "Running migration",
            Step::Starting => "Starting services",
            Step::Reclaiming => "Reclaiming unused images",
        }
    }

    pub(crate) fn state(self) -> PipelineState {
        match self {
            Step::Authenticating => PipelineState::Authenticating,
            Step::Fetching => PipelineState::Fetching,
            Step::TearingDown => PipelineState::TearingDown,
            Step::Migrating => PipelineState::Migrating,
            Step::Starting => PipelineState::Starting,
            Step::Reclaiming => PipelineState::Reclaiming,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Authenticating => "authenticating",
            Step::Fetching => "fetching",
            Step::TearingDown => "tearing_down",
            Step::Migrating => "migrating",
            Step::Starting => "starting",
            Step::Reclaiming => "reclaiming",
        };
        f.write_str(name)
    }
}

/// Classification of a step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CredentialMissing,
    AuthenticationFailed,
    PullError,
    TeardownError,
    MigrationError,
    StartupError,
    ReclaimError,
}

impl FailureKind {
    /// Whether this failure halts the pipeline.
    pub fn is_fatal(self) -> bool {
        !matches!(self, FailureKind::ReclaimError)
    }

    /// Whether the stack may be down after this failure.
    pub fn is_degrading(self) -> bool {
        matches!(
            self,
            FailureKind::TeardownError | FailureKind::MigrationError | FailureKind::StartupError
        )
    }

    pub fn is_configuration(self) -> bool {
        matches!(self, FailureKind::CredentialMissing)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::CredentialMissing => "CredentialMissing",
            FailureKind::AuthenticationFailed => "AuthenticationFailed",
            FailureKind::PullError => "PullError",
            FailureKind::TeardownError => "TeardownError",
            FailureKind::MigrationError => "MigrationError",
            FailureKind::StartupError => "StartupError",
            FailureKind::ReclaimError => "ReclaimError",
        };
        f.write_str(name)
    }
}

/// A typed failure with a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub cause: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.cause)
    }
}

impl From<CredentialError> for StepFailure {
    fn from(err: CredentialError) -> Self {
        let kind = match err {
            CredentialError::Missing { .. } => FailureKind::CredentialMissing,
            CredentialError::Rejected(_) | CredentialError::Unreachable(_) => {
                FailureKind::AuthenticationFailed
            }
        };
        StepFailure::new(kind, err.to_string())
    }
}

impl From<PullError> for StepFailure {
    fn from(err: PullError) -> Self {
        StepFailure::new(FailureKind::PullError, err.to_string())
    }
}

impl From<TeardownError> for StepFailure {
    fn from(err: TeardownError) -> Self {
        StepFailure::new(FailureKind::TeardownError, err.to_string())
    }
}

impl From<MigrationError> for StepFailure {
    fn from(err: MigrationError) -> Self {
        StepFailure::new(FailureKind::MigrationError, err.to_string())
    }
}

impl From<StartupError> for StepFailure {
    fn from(err: StartupError) -> Self {
        StepFailure::new(FailureKind::StartupError, err.to_string())
    }
}

impl From<ReclaimError> for StepFailure {
    fn from(err: ReclaimError) -> Self {
        StepFailure::new(FailureKind::ReclaimError, err.to_string())
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// Non-fatal failure; the pipeline carried on.
    Warning(StepFailure),
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            StepOutcome::Succeeded => None,
            StepOutcome::Warning(f) | StepOutcome::Failed(f) => Some(f),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: Step,
    pub outcome: StepOutcome,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Where the pipeline is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Authenticating,
    Fetching,
    TearingDown,
    Migrating,
    Starting,
    Reclaiming,
    Done,
    Failed { step: Step, kind: FailureKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Reached `Done`. Reclaim warnings may still be present.
    Succeeded,
    /// Halted before anything was torn down; the old stack is untouched.
    Failed,
    /// Halted at or after teardown; the stack may be down.
    Degraded,
}

/// Everything that happened during one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub stack: StackName,
    pub status: ReportStatus,
    pub state: PipelineState,
    pub steps: Vec<StepResult>,
    pub warnings: Vec<Warning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    /// The fatal failure that halted the run, if any.
    pub fn failure(&self) -> Option<(Step, &StepFailure)> {
        self.steps.iter().find_map(|result| match &result.outcome {
            StepOutcome::Failed(failure) => Some((result.step, failure)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Succeeded
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            ReportStatus::Succeeded => EXIT_OK,
            ReportStatus::Degraded => EXIT_DEGRADED,
            ReportStatus::Failed => match self.failure() {
                Some((_, failure)) if failure.kind.is_configuration() => EXIT_CONFIG,
                _ => EXIT_FAILED,
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Overall status implied by the first fatal failure, if any.
pub(crate) fn status_for(failure: Option<FailureKind>) -> ReportStatus {
    match failure {
        None => ReportStatus::Succeeded,
        Some(kind) if kind.is_degrading() => ReportStatus::Degraded,
        Some(_) => ReportStatus::Failed,
    }
}
