// ABOUTME: Validated network alias for service discovery on the stack network.
// ABOUTME: Services reach each other by alias, which defaults to the service name.

use std::fmt;
use thiserror::Error;

use super::ServiceName;

#[derive(Debug, Error)]
pub enum NetworkAliasError {
    #[error("network alias cannot be empty")]
    Empty,

    #[error("invalid character in network alias: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAlias(String);

impl NetworkAlias {
    pub fn new(value: &str) -> Result<Self, NetworkAliasError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NetworkAliasError::Empty);
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            return Err(NetworkAliasError::InvalidChar(c));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub(crate) fn from_service(service: &ServiceName) -> Self {
        Self(service.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
