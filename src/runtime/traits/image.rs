// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, check existence, and prune unused container images.

use super::shared_types::{PruneFilters, PruneReport, RegistryAuth};
use crate::types::ImageRef;
use async_trait::async_trait;

/// Image operations: pull, check existence, prune.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Pull an image from a registry. Pulling an image that is already
    /// current is not an error.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Delete images no container references.
    async fn prune_images(&self, filters: &PruneFilters) -> Result<PruneReport, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("prune failed: {0}")]
    PruneFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
