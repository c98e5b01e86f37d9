// ABOUTME: Registry login trait for container runtimes.
// ABOUTME: Validates credentials against a registry through the engine's auth endpoint.

use super::shared_types::RegistryAuth;
use crate::types::Secret;
use async_trait::async_trait;

/// Registry authentication.
#[async_trait]
pub trait RegistryOps: Send + Sync {
    /// Log in to the registry named in `auth.server`.
    async fn login(&self, auth: &RegistryAuth) -> Result<LoginGrant, RegistryError>;
}

/// What a successful login hands back.
#[derive(Debug, Clone, Default)]
pub struct LoginGrant {
    /// Status line from the engine (e.g. "Login Succeeded").
    pub status: String,
    /// Token some registries issue to use instead of the password.
    pub identity_token: Option<Secret>,
}

/// Errors from registry login.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry rejected credentials: {0}")]
    Rejected(String),

    #[error("registry unreachable: {0}")]
    Unreachable(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
