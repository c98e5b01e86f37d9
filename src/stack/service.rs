// ABOUTME: Service and migration entries of a stack definition.
// ABOUTME: Turns them into runtime container configurations with berth's labels.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::deserialize::{
    deserialize_memory, deserialize_nonempty, deserialize_ports, deserialize_volumes,
};
use crate::config::{EnvValue, RestartPolicy, resolve_env_map};
use crate::error::Result;
use crate::runtime::{
    ContainerConfig, PortMapping, ResourceLimits, RestartPolicyConfig, VolumeMount,
};
use crate::types::{ImageRef, NetworkAlias, ServiceName, StackName};

use super::labels;

/// One long-running service of the stack.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    pub image: ImageRef,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default, deserialize_with = "deserialize_ports")]
    pub ports: Vec<PortMapping>,

    #[serde(default, deserialize_with = "deserialize_volumes")]
    pub volumes: Vec<VolumeMount>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default)]
    pub resources: Option<ResourcesSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcesSpec {
    /// Memory limit, e.g. `512m` or `2g`.
    #[serde(default, deserialize_with = "deserialize_memory")]
    pub memory: Option<u64>,

    /// CPU quota, 1.0 being one full CPU.
    #[serde(default)]
    pub cpus: Option<f64>,
}

impl From<&ResourcesSpec> for ResourceLimits {
    fn from(spec: &ResourcesSpec) -> Self {
        ResourceLimits {
            memory: spec.memory,
            cpus: spec.cpus,
        }
    }
}

/// The one-off schema migration run between teardown and start.
///
/// Runs either a service's image (inheriting that service's environment) or an
/// explicit image.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationSpec {
    #[serde(default)]
    pub service: Option<ServiceName>,

    #[serde(default)]
    pub image: Option<ImageRef>,

    #[serde(deserialize_with = "deserialize_nonempty")]
    pub command: NonEmpty<String>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

/// Container name for a service: `<stack>-<service>`.
pub fn service_container_name(stack: &StackName, service: &ServiceName) -> String {
    format!("{stack}-{service}")
}

/// Container name for a migration run, unique per second.
pub fn migration_container_name(stack: &StackName) -> String {
    format!(
        "{stack}-migrate-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    )
}

fn base_labels(stack: &StackName, role: &str) -> HashMap<String, String> {
    HashMap::from([
        (labels::MANAGED.to_string(), "true".to_string()),
        (labels::STACK.to_string(), stack.to_string()),
        (labels::ROLE.to_string(), role.to_string()),
    ])
}

impl ServiceSpec {
    pub(crate) fn container_config(
        &self,
        stack: &StackName,
        service: &ServiceName,
        network: &str,
        stop_timeout: Duration,
    ) -> Result<ContainerConfig> {
        // User labels first so berth's own labels cannot be overridden.
        let mut container_labels = self.labels.clone();
        container_labels.extend(base_labels(stack, labels::ROLE_SERVICE));
        container_labels.insert(labels::SERVICE.to_string(), service.to_string());

        Ok(ContainerConfig {
            name: service_container_name(stack, service),
            image: self.image.clone(),
            env: resolve_env_map(&self.env)?,
            labels: container_labels,
            ports: self.ports.clone(),
            volumes: self.volumes.clone(),
            command: self.command.clone(),
            entrypoint: self.entrypoint.clone(),
            restart_policy: RestartPolicyConfig::from(&self.restart),
            resources: self.resources.as_ref().map(ResourceLimits::from),
            stop_timeout: Some(stop_timeout),
            network: Some(network.to_string()),
            network_aliases: vec![NetworkAlias::from_service(service)],
        })
    }
}

impl MigrationSpec {
    /// Build the one-off container. `borrowed` is the service named by
    /// `service:`, already looked up by the caller.
    pub(crate) fn container_config(
        &self,
        stack: &StackName,
        image: &ImageRef,
        borrowed: Option<&ServiceSpec>,
        network: &str,
    ) -> Result<ContainerConfig> {
        let mut env = match borrowed {
            Some(service) => resolve_env_map(&service.env)?,
            None => HashMap::new(),
        };
        env.extend(resolve_env_map(&self.env)?);

        let volumes = borrowed.map(|s| s.volumes.clone()).unwrap_or_default();

        Ok(ContainerConfig {
            name: migration_container_name(stack),
            image: image.clone(),
            env,
            labels: base_labels(stack, labels::ROLE_MIGRATION),
            ports: Vec::new(),
            volumes,
            command: Some(self.command.iter().cloned().collect()),
            entrypoint: None,
            restart_policy: RestartPolicyConfig::No,
            resources: borrowed
                .and_then(|s| s.resources.as_ref())
                .map(ResourceLimits::from),
            stop_timeout: None,
            network: Some(network.to_string()),
            network_aliases: Vec::new(),
        })
    }
}
