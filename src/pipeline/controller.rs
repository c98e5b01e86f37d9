// ABOUTME: Drives a deployment through every step in order and halts on the first fatal failure.
// ABOUTME: Each step is bounded by its timeout and the cancellation token, and recorded in the report.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::DeploymentConfig;
use crate::credentials::CredentialProvider;
use crate::deploy::{Deployment, MigrationSummary};
use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::runtime::DeployRuntime;
use crate::stack::StackDefinition;
use crate::types::StackName;

use super::report::{
    DeploymentReport, PipelineState, Step, StepFailure, StepOutcome, StepResult, status_for,
};

/// Sequences authentication, pull, teardown, migration, start, and reclaim.
///
/// There is no rollback: a failure after teardown leaves the stack as it is
/// and the report says so with a `Degraded` status.
pub struct PipelineController<'a, R> {
    runtime: &'a R,
    config: &'a DeploymentConfig,
    stack: &'a StackDefinition,
    provider: &'a CredentialProvider,
    output: Output,
}

impl<'a, R> PipelineController<'a, R>
where
    R: DeployRuntime + Clone + 'static,
{
    pub fn new(
        runtime: &'a R,
        config: &'a DeploymentConfig,
        stack: &'a StackDefinition,
        provider: &'a CredentialProvider,
    ) -> Self {
        Self {
            runtime,
            config,
            stack,
            provider,
            output: Output::default(),
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Run the pipeline to `Done` or to the first fatal failure.
    ///
    /// Never returns an error: everything that happened, including the
    /// failure, is in the report.
    pub async fn run(&self, cancel: &CancellationToken) -> DeploymentReport {
        let mut run = Run::new(&self.stack.name, &self.output);
        let timeouts = &self.config.timeouts;
        let runtime = self.runtime;
        tracing::info!("deploying stack {}", self.stack.name);

        let deployment = Deployment::new(self.config, self.stack);

        let step = Step::Authenticating;
        let Some(deployment) = run
            .step(
                step,
                step.timeout(timeouts),
                cancel,
                deployment.authenticate(self.provider, runtime),
            )
            .await
        else {
            return run.finish();
        };

        let step = Step::Fetching;
        let Some(deployment) = run
            .step(step, step.timeout(timeouts), cancel, deployment.pull(runtime))
            .await
        else {
            return run.finish();
        };

        let step = Step::TearingDown;
        let Some(deployment) = run
            .step(step, step.timeout(timeouts), cancel, deployment.teardown(runtime))
            .await
        else {
            return run.finish();
        };

        // The runner enforces its own deadline so the container is removed
        // before the step returns.
        let step = Step::Migrating;
        let Some((deployment, summary)) = run
            .delegated(
                step,
                deployment.migrate(runtime, step.timeout(timeouts), cancel),
            )
            .await
        else {
            return run.finish();
        };
        if summary == MigrationSummary::Skipped {
            tracing::debug!("no migration defined for {}", self.stack.name);
        }

        let step = Step::Starting;
        let Some(deployment) = run
            .step(step, step.timeout(timeouts), cancel, deployment.start(runtime))
            .await
        else {
            return run.finish();
        };

        let step = Step::Reclaiming;
        run.non_fatal(
            step,
            step.timeout(timeouts),
            cancel,
            deployment.reclaim(runtime),
        )
        .await;

        let deployment = deployment.complete();
        tracing::info!(
            "stack {} deployed with {} service(s)",
            deployment.stack_name(),
            deployment.containers().len()
        );
        run.finish()
    }
}

/// Bookkeeping for one pipeline run.
struct Run<'o> {
    stack: StackName,
    output: &'o Output,
    state: PipelineState,
    steps: Vec<StepResult>,
    diagnostics: Diagnostics,
    started_at: DateTime<Utc>,
}

impl<'o> Run<'o> {
    fn new(stack: &StackName, output: &'o Output) -> Self {
        Self {
            stack: stack.clone(),
            output,
            state: PipelineState::Idle,
            steps: Vec::new(),
            diagnostics: Diagnostics::default(),
            started_at: Utc::now(),
        }
    }

    /// Run a fatal step bounded by its timeout and the cancellation token.
    async fn step<T, E, F>(
        &mut self,
        step: Step,
        limit: Option<Duration>,
        cancel: &CancellationToken,
        fut: F,
    ) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        StepFailure: From<E>,
    {
        self.delegated::<T, StepFailure, _>(step, bounded(step, limit, cancel, fut))
            .await
    }

    /// Run a fatal step that handles its own timeout and cancellation.
    async fn delegated<T, E, F>(&mut self, step: Step, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        StepFailure: From<E>,
    {
        let started = self.begin(step);
        match fut.await {
            Ok(value) => {
                self.end(step, started, StepOutcome::Succeeded);
                Some(value)
            }
            Err(e) => {
                let failure = StepFailure::from(e);
                tracing::error!("{} failed: {}", step, failure);
                self.state = PipelineState::Failed {
                    step,
                    kind: failure.kind,
                };
                self.end(step, started, StepOutcome::Failed(failure));
                None
            }
        }
    }

    /// Run a step whose failure only produces a warning. Only reclaim is
    /// non-fatal.
    async fn non_fatal<T, E, F>(
        &mut self,
        step: Step,
        limit: Option<Duration>,
        cancel: &CancellationToken,
        fut: F,
    ) where
        F: Future<Output = Result<T, E>>,
        StepFailure: From<E>,
    {
        let started = self.begin(step);
        match bounded(step, limit, cancel, fut).await {
            Ok(_) => self.end(step, started, StepOutcome::Succeeded),
            Err(failure) => {
                self.diagnostics
                    .warn(Warning::reclaim_failed(failure.cause.clone()));
                self.end(step, started, StepOutcome::Warning(failure));
            }
        }
    }

    fn begin(&mut self, step: Step) -> Instant {
        tracing::info!("{} started", step);
        self.state = step.state();
        self.output.step_started(step);
        Instant::now()
    }

    fn end(&mut self, step: Step, started: Instant, outcome: StepOutcome) {
        let result = StepResult {
            step,
            outcome,
            elapsed: started.elapsed(),
        };
        if result.outcome == StepOutcome::Succeeded {
            tracing::info!("{} succeeded in {:?}", step, result.elapsed);
        }
        self.output.step_finished(&result);
        self.steps.push(result);
    }

    fn finish(self) -> DeploymentReport {
        let (state, failure) = match self.state {
            PipelineState::Failed { kind, .. } => (self.state, Some(kind)),
            _ => (PipelineState::Done, None),
        };

        DeploymentReport {
            stack: self.stack,
            status: status_for(failure),
            state,
            steps: self.steps,
            warnings: self.diagnostics.into_warnings(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Bound a step future by its time limit and the cancellation token.
///
/// Cancellation wins if it is already requested, so a cancelled run never
/// starts another step.
async fn bounded<T, E, F>(
    step: Step,
    limit: Option<Duration>,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, StepFailure>
where
    F: Future<Output = Result<T, E>>,
    StepFailure: From<E>,
{
    let kind = step.failure_kind();
    let run = async {
        match limit {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result.map_err(StepFailure::from),
                Err(_) => Err(StepFailure::new(
                    kind,
                    format!("timed out after {limit:?}"),
                )),
            },
            None => fut.await.map_err(StepFailure::from),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepFailure::new(kind, "cancelled")),
        result = run => result,
    }
}
