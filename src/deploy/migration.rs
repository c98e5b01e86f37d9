// ABOUTME: Runs the stack's schema migration in a one-off container.
// ABOUTME: The container is removed on every exit path, including timeout, cancellation, and drop.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::runtime::{ContainerError, ContainerOps, LogOps, NetworkOps};
use crate::stack::StackDefinition;
use crate::types::ContainerId;

use super::error::MigrationError;
use super::network::ensure_network;

/// Lines of container output kept when a migration fails.
const OUTPUT_TAIL_LINES: u64 = 40;
const REMOVE_ATTEMPTS: u32 = 3;
const REMOVE_BACKOFF: Duration = Duration::from_millis(500);
/// Upper bound on a single removal attempt.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// What the migration step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationSummary {
    /// The stack defines no migration.
    Skipped,
    /// The migration container exited 0 and was removed.
    Applied { container: String },
}

/// Absolute end of the migration step, with the limit it was derived from.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    fn starting_now(limit: Option<Duration>) -> Option<Self> {
        limit.map(|limit| Self {
            limit,
            at: Instant::now() + limit,
        })
    }
}

/// Race `work` against cancellation and the step deadline.
///
/// Cancellation wins ties, then expiry; `work` is dropped when either fires.
async fn interruptible<F: Future>(
    work: F,
    deadline: Option<Deadline>,
    cancel: &CancellationToken,
) -> Result<F::Output, MigrationError> {
    let expired = async {
        match deadline {
            Some(d) => {
                tokio::time::sleep_until(d.at).await;
                d.limit
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MigrationError::Cancelled),
        limit = expired => Err(MigrationError::TimedOut(limit)),
        output = work => Ok(output),
    }
}

/// Removes a container when released, or in the background if dropped first.
struct ScopedContainer<R: ContainerOps + Clone + 'static> {
    runtime: R,
    id: ContainerId,
    name: String,
    armed: bool,
}

impl<R: ContainerOps + Clone + 'static> ScopedContainer<R> {
    fn new(runtime: R, id: ContainerId, name: String) -> Self {
        Self {
            runtime,
            id,
            name,
            armed: true,
        }
    }

    fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Force-remove the container, retrying transient failures.
    ///
    /// Each attempt is bounded by [`REMOVE_TIMEOUT`]; cancellation does not
    /// cut cleanup short.
    async fn release(mut self) -> Result<(), ContainerError> {
        self.armed = false;

        let mut attempt = 1;
        loop {
            let removal = self.runtime.remove_container(&self.id, true);
            let removed = tokio::time::timeout(REMOVE_TIMEOUT, removal)
                .await
                .unwrap_or_else(|_| {
                    Err(ContainerError::Runtime(format!(
                        "removal did not finish within {REMOVE_TIMEOUT:?}"
                    )))
                });
            match removed {
                Ok(()) | Err(ContainerError::NotFound(_)) => {
                    tracing::debug!("removed migration container {}", self.name);
                    return Ok(());
                }
                Err(e) if attempt < REMOVE_ATTEMPTS => {
                    tracing::warn!(
                        "removing {} failed (attempt {}/{}): {}",
                        self.name,
                        attempt,
                        REMOVE_ATTEMPTS,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(REMOVE_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: ContainerOps + Clone + 'static> Drop for ScopedContainer<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("migration interrupted, removing {} in background", name);
                let runtime = self.runtime.clone();
                let id = self.id.clone();
                handle.spawn(async move {
                    if let Err(e) = runtime.remove_container(&id, true).await
                        && !e.is_not_found()
                    {
                        tracing::error!("failed to remove migration container {}: {}", name, e);
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    "no async runtime to remove migration container {}; remove it manually",
                    name
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationRunner;

impl MigrationRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run the stack's migration to completion.
    ///
    /// `deadline` bounds the whole step, from the network check to the
    /// container's exit; `cancel` aborts it at any point. A container that
    /// was created is still removed before this returns, and a failed
    /// removal is reported as a migration failure.
    pub async fn run<R>(
        &self,
        runtime: &R,
        stack: &StackDefinition,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<MigrationSummary, MigrationError>
    where
        R: ContainerOps + NetworkOps + LogOps + Clone + 'static,
    {
        let config = match stack.migration_config() {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::info!("{} has no migration", stack.name);
                return Ok(MigrationSummary::Skipped);
            }
            Err(e) => return Err(MigrationError::Config(e.to_string())),
        };

        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        let deadline = Deadline::starting_now(deadline);

        interruptible(ensure_network(runtime, stack), deadline, cancel)
            .await?
            .map_err(|source| MigrationError::Network {
                network: stack.network_name().to_string(),
                source,
            })?;

        // Creation runs in its own task so an interrupted run cannot leave
        // an untracked container behind: whichever side ends up holding the
        // guard, dropping it removes the container.
        let container = config.name.clone();
        let (created_tx, mut created_rx) = oneshot::channel();
        tokio::spawn({
            let runtime = runtime.clone();
            let name = container.clone();
            async move {
                let created = runtime
                    .create_container(&config)
                    .await
                    .map(|id| ScopedContainer::new(runtime.clone(), id, name));
                let _ = created_tx.send(created);
            }
        });
        let guard = match interruptible(&mut created_rx, deadline, cancel).await? {
            Ok(created) => created.map_err(MigrationError::Create)?,
            Err(_) => {
                return Err(MigrationError::Create(ContainerError::Runtime(
                    "container creation task ended without a result".to_string(),
                )));
            }
        };
        tracing::info!("running migration in {}", container);

        let outcome = match self.execute(runtime, guard.id(), deadline, cancel).await {
            Ok(0) => Ok(MigrationSummary::Applied {
                container: container.clone(),
            }),
            Ok(code) => {
                let output = match interruptible(
                    runtime.tail_logs(guard.id(), OUTPUT_TAIL_LINES),
                    deadline,
                    cancel,
                )
                .await
                {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => format!("<output unavailable: {e}>"),
                    Err(e) => format!("<output unavailable: {e}>"),
                };
                Err(MigrationError::NonZeroExit { code, output })
            }
            Err(e) => Err(e),
        };

        match (outcome, guard.release().await) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(e)) => Err(MigrationError::Cleanup {
                container,
                reason: e.to_string(),
            }),
            (Err(primary), Err(e)) => Err(MigrationError::CleanupAfterFailure {
                primary: Box::new(primary),
                container,
                reason: e.to_string(),
            }),
        }
    }

    /// Start the container and wait for its exit code.
    async fn execute<R: ContainerOps + ?Sized>(
        &self,
        runtime: &R,
        id: &ContainerId,
        deadline: Option<Deadline>,
        cancel: &CancellationToken,
    ) -> Result<i64, MigrationError> {
        let run = async {
            runtime
                .start_container(id)
                .await
                .map_err(MigrationError::Start)?;
            runtime.wait_container(id).await.map_err(MigrationError::Wait)
        };

        interruptible(run, deadline, cancel).await?
    }
}
