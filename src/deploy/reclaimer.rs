// ABOUTME: Prunes images left behind by previous deployments.
// ABOUTME: Runs last; its failure degrades nothing and is reported as a warning.

use crate::runtime::{ImageOps, PruneFilters};

use super::error::ReclaimError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimSummary {
    pub images_deleted: usize,
    pub space_reclaimed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactReclaimer {
    filters: PruneFilters,
}

impl ArtifactReclaimer {
    pub fn new(filters: PruneFilters) -> Self {
        Self { filters }
    }

    pub async fn reclaim<R: ImageOps + ?Sized>(
        &self,
        runtime: &R,
    ) -> Result<ReclaimSummary, ReclaimError> {
        let report = runtime
            .prune_images(&self.filters)
            .await
            .map_err(ReclaimError::Prune)?;

        let summary = ReclaimSummary {
            images_deleted: report.images_deleted.len(),
            space_reclaimed: report.space_reclaimed,
        };
        tracing::info!(
            "reclaimed {} image(s), {} bytes",
            summary.images_deleted,
            summary.space_reclaimed
        );
        Ok(summary)
    }
}
