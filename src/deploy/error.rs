// ABOUTME: Error types for deployment steps and the deploy lock.
// ABOUTME: One enum per component so each step's failure names what went wrong.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::runtime::{ContainerError, ImageError, NetworkError};

/// Errors from pulling the stack's images.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error("failed to pull {image}: {reason}")]
    Pull { image: String, reason: String },

    #[error("registry refused {image}: {reason}")]
    Unauthorized { image: String, reason: String },

    #[error("{image} is not present after pulling")]
    Missing { image: String },

    #[error("failed to inspect {image}: {reason}")]
    Inspect { image: String, reason: String },
}

impl PullError {
    pub(crate) fn from_image_error(
        image: String,
        err: ImageError,
        scrub: impl Fn(&str) -> String,
    ) -> Self {
        match err {
            ImageError::AuthenticationFailed(msg) => PullError::Unauthorized {
                image,
                reason: scrub(&msg),
            },
            other => PullError::Pull {
                image,
                reason: scrub(&other.to_string()),
            },
        }
    }
}

/// A container teardown could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub container: String,
    pub reason: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.container, self.reason)
    }
}

/// Errors from tearing down the running stack.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("failed to list stack containers: {0}")]
    List(#[source] ContainerError),

    #[error("could not remove {}: {}", .0.len(), join(.0))]
    Incomplete(Vec<TeardownFailure>),
}

fn join(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from starting the new stack.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to prepare network {network}: {source}")]
    Network {
        network: String,
        #[source]
        source: NetworkError,
    },

    #[error("invalid configuration for {service}: {reason}")]
    Config { service: String, reason: String },

    #[error("failed to create {service}: {source}")]
    Create {
        service: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to start {service}: {source}")]
    Start {
        service: String,
        #[source]
        source: ContainerError,
    },
}

/// Errors from the one-off migration container.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("invalid migration configuration: {0}")]
    Config(String),

    #[error("failed to prepare network {network}: {source}")]
    Network {
        network: String,
        #[source]
        source: NetworkError,
    },

    #[error("failed to create migration container: {0}")]
    Create(#[source] ContainerError),

    #[error("failed to start migration container: {0}")]
    Start(#[source] ContainerError),

    #[error("failed waiting for migration container: {0}")]
    Wait(#[source] ContainerError),

    #[error("migration exited with code {code}{}", tail_suffix(.output))]
    NonZeroExit { code: i64, output: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("failed to remove migration container {container}: {reason}")]
    Cleanup { container: String, reason: String },

    #[error("{primary}; additionally failed to remove migration container {container}: {reason}")]
    CleanupAfterFailure {
        primary: Box<MigrationError>,
        container: String,
        reason: String,
    },
}

fn tail_suffix(output: &str) -> String {
    let output = output.trim_end();
    if output.is_empty() {
        String::new()
    } else {
        format!("; last output:\n{output}")
    }
}

/// Errors from pruning unused images.
#[derive(Debug, thiserror::Error)]
pub enum ReclaimError {
    #[error("image prune failed: {0}")]
    Prune(#[source] ImageError),
}

/// Who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Errors from acquiring or releasing the deploy lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "deploy lock held by {} (pid {}) since {}; use --force-lock to break it",
        .0.holder, .0.pid, .0.started_at
    )]
    Held(LockHolderInfo),

    #[error("deploy lock error: {0}")]
    Io(String),
}
