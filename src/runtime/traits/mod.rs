// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines RegistryOps, ImageOps, ContainerOps, NetworkOps, LogOps, RuntimeInfo.

mod container;
mod image;
mod logs;
mod network;
mod registry;
mod runtime_info;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream};
pub use network::{NetworkError, NetworkOps};
pub use registry::{LoginGrant, RegistryError, RegistryOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Everything a deployment needs from a runtime.
///
/// Blanket-implemented, so any type providing the individual capabilities
/// (the bollard runtime, or a test double) can drive the pipeline.
pub trait DeployRuntime: RegistryOps + ImageOps + ContainerOps + NetworkOps + LogOps {}

impl<T> DeployRuntime for T where T: RegistryOps + ImageOps + ContainerOps + NetworkOps + LogOps {}
