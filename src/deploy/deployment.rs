// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Borrows the frozen config and stack; the state carries per-step results.

use crate::config::DeploymentConfig;
use crate::stack::StackDefinition;
use crate::types::{ContainerId, ServiceName, StackName};

use super::state::{Completed, Initialized, Started};

/// A deployment in progress, parameterized by its current state.
///
/// Transitions consume the deployment, so steps can only run in pipeline
/// order and a failed step leaves nothing to continue from.
#[derive(Debug)]
pub struct Deployment<'a, S> {
    pub(crate) config: &'a DeploymentConfig,
    pub(crate) stack: &'a StackDefinition,
    pub(crate) state: S,
}

impl<'a> Deployment<'a, Initialized> {
    pub fn new(config: &'a DeploymentConfig, stack: &'a StackDefinition) -> Self {
        Deployment {
            config,
            stack,
            state: Initialized,
        }
    }
}

impl<'a, S> Deployment<'a, S> {
    pub fn stack_name(&self) -> &StackName {
        &self.stack.name
    }

    pub fn config(&self) -> &'a DeploymentConfig {
        self.config
    }

    pub fn stack(&self) -> &'a StackDefinition {
        self.stack
    }

    /// Move to the next state.
    pub(crate) fn transition<T>(self, state: T) -> Deployment<'a, T> {
        Deployment {
            config: self.config,
            stack: self.stack,
            state,
        }
    }
}

impl Deployment<'_, Started> {
    /// Service containers started by this deployment.
    pub fn containers(&self) -> &[(ServiceName, ContainerId)] {
        &self.state.containers
    }
}

impl Deployment<'_, Completed> {
    /// Service containers started by this deployment.
    pub fn containers(&self) -> &[(ServiceName, ContainerId)] {
        &self.state.containers
    }
}
