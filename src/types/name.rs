// ABOUTME: DNS-label names for stacks and services.
// ABOUTME: Both end up in container names, labels, and network aliases, so RFC 1123 rules apply.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("{0} name cannot be empty")]
    Empty(&'static str),

    #[error("{0} name exceeds maximum length of 63 characters")]
    TooLong(&'static str),

    #[error("{0} name must start and end with a letter or digit")]
    BadEdge(&'static str),

    #[error("{0} name must be lowercase")]
    NotLowercase(&'static str),

    #[error("invalid character in {0} name: '{1}'")]
    InvalidChar(&'static str, char),
}

fn validate(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty(kind));
    }
    if value.len() > MAX_LEN {
        return Err(NameError::TooLong(kind));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(NameError::BadEdge(kind));
    }

    for c in value.chars() {
        if c.is_ascii_uppercase() {
            return Err(NameError::NotLowercase(kind));
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(NameError::InvalidChar(kind, c));
        }
    }

    Ok(())
}

/// Name of a deployable stack; prefixes every container the stack owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackName(String);

impl StackName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        validate("stack", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of one service inside a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        validate("service", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Service names are always valid network aliases (their charset is a subset).
    pub fn as_alias(&self) -> super::NetworkAlias {
        super::NetworkAlias::from_service(self)
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StackName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        StackName::new(&s).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceName::new(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for StackName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Serialize for ServiceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_labels() {
        assert!(StackName::new("shop").is_ok());
        assert!(ServiceName::new("api-v2").is_ok());
        assert!(ServiceName::new("a").is_ok());
    }

    #[test]
    fn rejects_edges_and_case() {
        assert_eq!(StackName::new("-shop"), Err(NameError::BadEdge("stack")));
        assert_eq!(ServiceName::new("web-"), Err(NameError::BadEdge("service")));
        assert_eq!(StackName::new("Shop"), Err(NameError::NotLowercase("stack")));
        assert_eq!(
            ServiceName::new("web_1"),
            Err(NameError::InvalidChar("service", '_'))
        );
    }

    #[test]
    fn rejects_long_names() {
        let long = "a".repeat(64);
        assert_eq!(StackName::new(&long), Err(NameError::TooLong("stack")));
        assert!(StackName::new(&long[..63]).is_ok());
    }

    #[test]
    fn error_names_the_kind() {
        let err = ServiceName::new("").unwrap_err();
        assert_eq!(err.to_string(), "service name cannot be empty");
    }
}
