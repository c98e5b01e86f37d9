// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, NetworkConfig, RegistryAuth, prune filters and reports.

use crate::types::{ImageRef, NetworkAlias, Secret};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image to run.
    pub image: ImageRef,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Labels to apply.
    pub labels: HashMap<String, String>,
    /// Port mappings (host:container).
    pub ports: Vec<PortMapping>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    /// Entrypoint (overrides image ENTRYPOINT).
    pub entrypoint: Option<Vec<String>>,
    /// Restart policy.
    pub restart_policy: RestartPolicyConfig,
    /// Resource limits.
    pub resources: Option<ResourceLimits>,
    /// Stop timeout.
    pub stop_timeout: Option<Duration>,
    /// Network to connect to.
    pub network: Option<String>,
    /// Aliases on that network.
    pub network_aliases: Vec<NetworkAlias>,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path or named volume.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    pub read_only: bool,
}

impl VolumeMount {
    /// Host paths are absolute or relative; anything else names a volume.
    pub fn is_bind(&self) -> bool {
        self.source.starts_with('/') || self.source.starts_with('.')
    }
}

/// Restart policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestartPolicyConfig {
    No,
    Always,
    #[default]
    UnlessStopped,
    OnFailure { max_retries: Option<u32> },
}

/// Resource limits for a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory: Option<u64>,
    /// CPU quota (1.0 = 1 CPU).
    pub cpus: Option<f64>,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    /// Network driver (bridge, overlay, ...).
    pub driver: Option<String>,
    pub labels: HashMap<String, String>,
}

/// Registry authentication material.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: Secret,
    pub password: Secret,
    /// Registry server (e.g. "ghcr.io").
    pub server: String,
    /// Identity token from a previous login, preferred over the password.
    pub identity_token: Option<Secret>,
}

/// Which images a prune may delete.
#[derive(Debug, Clone, Default)]
pub struct PruneFilters {
    /// Only untagged images; otherwise every image without a container.
    pub dangling_only: bool,
    /// Only images created more than this long ago.
    pub older_than: Option<Duration>,
}

/// Outcome of an image prune.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// References or IDs of deleted images.
    pub images_deleted: Vec<String>,
    pub space_reclaimed: u64,
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g. "Docker", "Podman").
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}
