// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialError, CredentialProvider};
use crate::runtime::{ContainerOps, ImageOps, LogOps, NetworkOps, RegistryOps};

use super::Deployment;
use super::controller::StackController;
use super::error::{MigrationError, PullError, ReclaimError, StartupError, TeardownError};
use super::fetcher::ImageFetcher;
use super::migration::{MigrationRunner, MigrationSummary};
use super::reclaimer::{ArtifactReclaimer, ReclaimSummary};
use super::state::{
    Authenticated, Completed, ImagesPulled, Initialized, Migrated, Started, TornDown,
};

impl<S> Deployment<'_, S> {
    fn controller(&self) -> StackController {
        StackController::new(self.config.stop.timeout)
    }
}

// =============================================================================
// Initialized -> Authenticated
// =============================================================================

impl<'a> Deployment<'a, Initialized> {
    /// Log in to the registry.
    ///
    /// # Errors
    ///
    /// `CredentialError::Missing` when a credential cannot be read; the
    /// runtime is not contacted in that case.
    #[must_use = "deployment state must be used"]
    pub async fn authenticate<R: RegistryOps + ?Sized>(
        self,
        provider: &CredentialProvider,
        runtime: &R,
    ) -> Result<Deployment<'a, Authenticated>, CredentialError> {
        let session = provider.authenticate(runtime).await?;
        Ok(self.transition(Authenticated { session }))
    }
}

// =============================================================================
// Authenticated -> ImagesPulled
// =============================================================================

impl<'a> Deployment<'a, Authenticated> {
    /// Pull every image of the stack. The session is dropped afterwards.
    #[must_use = "deployment state must be used"]
    pub async fn pull<R: ImageOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<'a, ImagesPulled>, PullError> {
        ImageFetcher::new()
            .pull(runtime, self.stack, &self.state.session)
            .await?;
        Ok(self.transition(ImagesPulled))
    }
}

// =============================================================================
// ImagesPulled -> TornDown
// =============================================================================

impl<'a> Deployment<'a, ImagesPulled> {
    /// Remove the running container set. First destructive step.
    #[must_use = "deployment state must be used"]
    pub async fn teardown<R: ContainerOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<'a, TornDown>, TeardownError> {
        self.controller().teardown(runtime, self.stack).await?;
        Ok(self.transition(TornDown))
    }
}

// =============================================================================
// TornDown -> Migrated
// =============================================================================

impl<'a> Deployment<'a, TornDown> {
    /// Run the schema migration. Deadline and cancellation are handled inside
    /// so the migration container is always cleaned up.
    #[must_use = "deployment state must be used"]
    pub async fn migrate<R>(
        self,
        runtime: &R,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(Deployment<'a, Migrated>, MigrationSummary), MigrationError>
    where
        R: ContainerOps + NetworkOps + LogOps + Clone + 'static,
    {
        let summary = MigrationRunner::new()
            .run(runtime, self.stack, deadline, cancel)
            .await?;
        Ok((self.transition(Migrated), summary))
    }
}

// =============================================================================
// Migrated -> Started
// =============================================================================

impl<'a> Deployment<'a, Migrated> {
    /// Start the new container set.
    #[must_use = "deployment state must be used"]
    pub async fn start<R: ContainerOps + NetworkOps + ?Sized>(
        self,
        runtime: &R,
    ) -> Result<Deployment<'a, Started>, StartupError> {
        let summary = self.controller().start(runtime, self.stack).await?;
        Ok(self.transition(Started {
            containers: summary.started,
        }))
    }
}

// =============================================================================
// Started -> Completed
// =============================================================================

impl<'a> Deployment<'a, Started> {
    /// Prune stale images. Borrows the deployment: completion does not depend
    /// on how the prune went.
    pub async fn reclaim<R: ImageOps + ?Sized>(
        &self,
        runtime: &R,
    ) -> Result<ReclaimSummary, ReclaimError> {
        ArtifactReclaimer::new(self.config.reclaim.prune_filters())
            .reclaim(runtime)
            .await
    }

    pub fn complete(self) -> Deployment<'a, Completed> {
        let containers = self.state.containers.clone();
        self.transition(Completed { containers })
    }
}
