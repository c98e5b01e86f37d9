// ABOUTME: Lifecycle of a stack's long-running containers.
// ABOUTME: Teardown removes everything labelled with the stack; start brings services up in name order.

use std::time::Duration;

use crate::runtime::{ContainerError, ContainerOps, ContainerSummary, NetworkOps};
use crate::stack::{StackDefinition, labels};
use crate::types::{ContainerId, ServiceName};

use super::error::{StartupError, TeardownError, TeardownFailure};
use super::network::ensure_network;

/// Containers teardown removed, by name.
#[derive(Debug, Clone, Default)]
pub struct TeardownSummary {
    pub removed: Vec<String>,
}

/// Containers start created and started, in start order.
#[derive(Debug, Clone, Default)]
pub struct StartSummary {
    pub started: Vec<(ServiceName, ContainerId)>,
}

#[derive(Debug, Clone)]
pub struct StackController {
    stop_timeout: Duration,
}

impl StackController {
    pub fn new(stop_timeout: Duration) -> Self {
        Self { stop_timeout }
    }

    /// Every container carrying the stack's labels, running or not.
    pub async fn inventory<R: ContainerOps + ?Sized>(
        &self,
        runtime: &R,
        stack: &StackDefinition,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut containers = runtime
            .list_containers(&labels::stack_filter(&stack.name))
            .await?;
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    /// Stop and remove every container of the stack, including leftover
    /// migration containers.
    ///
    /// Containers that are already stopped or already gone count as removed.
    /// All containers are attempted before a failure is reported.
    pub async fn teardown<R: ContainerOps + ?Sized>(
        &self,
        runtime: &R,
        stack: &StackDefinition,
    ) -> Result<TeardownSummary, TeardownError> {
        let containers = self
            .inventory(runtime, stack)
            .await
            .map_err(TeardownError::List)?;

        if containers.is_empty() {
            tracing::info!("nothing to tear down for {}", stack.name);
            return Ok(TeardownSummary::default());
        }

        let mut removed = Vec::new();
        let mut failures = Vec::new();

        for container in containers {
            if container.is_running() {
                match runtime.stop_container(&container.id, self.stop_timeout).await {
                    Ok(()) | Err(ContainerError::NotRunning(_)) | Err(ContainerError::NotFound(_)) => {}
                    // Removal below is forced, so a failed stop is not fatal yet.
                    Err(e) => tracing::warn!("failed to stop {}: {}", container.name, e),
                }
            }

            match runtime.remove_container(&container.id, true).await {
                Ok(()) | Err(ContainerError::NotFound(_)) => {
                    tracing::debug!("removed {}", container.name);
                    removed.push(container.name);
                }
                Err(e) => failures.push(TeardownFailure {
                    container: container.name,
                    reason: e.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            return Err(TeardownError::Incomplete(failures));
        }

        tracing::info!("removed {} container(s) of {}", removed.len(), stack.name);
        Ok(TeardownSummary { removed })
    }

    /// Create and start one detached container per service, in name order.
    ///
    /// If a service fails, its own container is removed and the step fails.
    /// Services started before it keep running.
    pub async fn start<R: ContainerOps + NetworkOps + ?Sized>(
        &self,
        runtime: &R,
        stack: &StackDefinition,
    ) -> Result<StartSummary, StartupError> {
        ensure_network(runtime, stack)
            .await
            .map_err(|source| StartupError::Network {
                network: stack.network_name().to_string(),
                source,
            })?;

        let mut started = Vec::new();

        for service in stack.services.keys() {
            let config = stack
                .service_config(service, self.stop_timeout)
                .map_err(|e| StartupError::Config {
                    service: service.to_string(),
                    reason: e.to_string(),
                })?;

            let id = runtime
                .create_container(&config)
                .await
                .map_err(|source| StartupError::Create {
                    service: service.to_string(),
                    source,
                })?;

            if let Err(source) = runtime.start_container(&id).await {
                if let Err(e) = runtime.remove_container(&id, true).await {
                    tracing::warn!("failed to remove {} after failed start: {}", config.name, e);
                }
                return Err(StartupError::Start {
                    service: service.to_string(),
                    source,
                });
            }

            tracing::debug!("started {} as {}", config.name, id.short());
            started.push((service.clone(), id));
        }

        tracing::info!("started {} service(s) of {}", started.len(), stack.name);
        Ok(StartSummary { started })
    }
}
