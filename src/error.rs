// ABOUTME: Application-wide error types for berth.
// ABOUTME: Uses thiserror, and classifies every error into a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::deploy::LockError;
use crate::runtime::{ContainerError, RuntimeError};

/// Exit code for a run that reached `Done`.
pub const EXIT_OK: i32 = 0;
/// Exit code for an operational failure before anything was torn down.
pub const EXIT_FAILED: i32 = 1;
/// Exit code for configuration problems (config, stack, credentials).
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a failure at or after teardown; the stack may be down.
pub const EXIT_DEGRADED: i32 = 3;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid stack definition: {0}")]
    InvalidStack(String),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to list stack containers: {0}")]
    Inventory(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this error when it aborts the run before the
    /// pipeline produces a report.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::ReadFile { .. }
            | Error::MissingEnvVar(_)
            | Error::InvalidConfig(_)
            | Error::InvalidStack(_)
            | Error::Yaml(_) => EXIT_CONFIG,
            Error::Credentials(CredentialError::Missing { .. }) => EXIT_CONFIG,
            Error::Runtime(e) if e.is_configuration() => EXIT_CONFIG,
            Error::Credentials(_)
            | Error::Runtime(_)
            | Error::Lock(_)
            | Error::Inventory(_)
            | Error::Io(_) => EXIT_FAILED,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
