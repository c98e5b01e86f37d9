// ABOUTME: Registry credentials: where they come from and how they become a session.
// ABOUTME: Credential values live in Secret wrappers and never reach logs or errors.

mod provider;
mod source;

pub use provider::{CredentialProvider, Session};
pub use source::{
    CommandSource, CredentialSource, EnvSource, FileSource, ResolvedSource, SourceError, from_config,
};

use crate::types::Secret;

/// Username and token for one registry, read fresh for each login.
///
/// Both values are secrets: neither shows up in `Debug` output.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    pub username: Secret,
    pub token: Secret,
}

/// Errors from resolving credentials or logging in.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// A source is absent, unreadable, or empty. Nothing was sent to the registry.
    #[error("registry {field} unavailable: {reason}")]
    Missing { field: &'static str, reason: String },

    #[error("registry rejected login: {0}")]
    Rejected(String),

    #[error("registry login failed: {0}")]
    Unreachable(String),
}
