// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each marker carries what the finished step produced.

use crate::credentials::Session;
use crate::types::{ContainerId, ServiceName};

/// Config and stack loaded, nothing contacted yet.
/// Available actions: `authenticate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Registry accepted our credentials.
/// Available actions: `pull()`
#[derive(Debug)]
pub struct Authenticated {
    pub(crate) session: Session,
}

/// Every image is present locally. Nothing destructive has happened yet.
/// Available actions: `teardown()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesPulled;

/// The previous container set is gone.
/// Available actions: `migrate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct TornDown;

/// Schema migration applied (or none defined).
/// Available actions: `start()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Migrated;

/// New container set started.
/// Available actions: `reclaim()`
#[derive(Debug, Clone, Default)]
pub struct Started {
    pub(crate) containers: Vec<(ServiceName, ContainerId)>,
}

/// Deployment finished.
#[derive(Debug, Clone, Default)]
pub struct Completed {
    pub(crate) containers: Vec<(ServiceName, ContainerId)>,
}
