// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the step components, state markers, and Deployment struct.

mod controller;
mod deployment;
mod error;
mod fetcher;
mod lock;
mod migration;
mod network;
mod reclaimer;
mod state;
mod transitions;

pub use controller::{StackController, StartSummary, TeardownSummary};
pub use deployment::Deployment;
pub use error::{
    LockError, LockHolderInfo, MigrationError, PullError, ReclaimError, StartupError,
    TeardownError, TeardownFailure,
};
pub use fetcher::{ImageFetcher, PullSummary};
pub use lock::{DeployLock, LockInfo, MIN_STALE_AGE};
pub use migration::{MigrationRunner, MigrationSummary};
pub use reclaimer::{ArtifactReclaimer, ReclaimSummary};
pub use state::{
    Authenticated, Completed, ImagesPulled, Initialized, Migrated, Started, TornDown,
};
