// ABOUTME: Container image reference parsing and registry matching.
// ABOUTME: Handles nginx, nginx:tag, registry:port/org/image:tag@digest.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

/// Registry implied by references without an explicit registry component.
pub const DEFAULT_REGISTRY: &str = "docker.io";

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((before, after)) if !after.is_empty() => (before, Some(after.to_string())),
            Some(_) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (rest, tag) = match rest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after.to_string())),
            _ => (rest, None),
        };

        if rest.is_empty() || rest.ends_with('/') || matches!(tag.as_deref(), Some("")) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, name) = match rest.split_once('/') {
            Some((first, name))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), name.to_string())
            }
            _ => (None, rest.to_string()),
        };

        let tag = match (tag, &digest) {
            (None, None) => Some("latest".to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Registry host this image is pulled from, defaulting to Docker Hub.
    pub fn registry_host(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Whether this image is hosted on the given registry endpoint.
    ///
    /// The endpoint may carry a scheme or a trailing path (`https://ghcr.io/`),
    /// and `index.docker.io` is treated as Docker Hub.
    pub fn is_hosted_on(&self, endpoint: &str) -> bool {
        normalize_registry(self.registry_host()) == normalize_registry(endpoint)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

/// Reduce a registry endpoint to a comparable host[:port].
pub(crate) fn normalize_registry(endpoint: &str) -> String {
    let host = endpoint
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host).to_ascii_lowercase();
    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" => DEFAULT_REGISTRY.to_string(),
        _ => host,
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{registry}/")?;
        }
        f.write_str(&self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageRef::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_with_port_is_not_a_tag() {
        let img = ImageRef::parse("localhost:5000/shop/web").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "shop/web");
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn unqualified_images_live_on_docker_hub() {
        let img = ImageRef::parse("postgres:16").unwrap();
        assert_eq!(img.registry_host(), DEFAULT_REGISTRY);
        assert!(img.is_hosted_on("https://index.docker.io/v1/"));
        assert!(!img.is_hosted_on("ghcr.io"));
    }

    #[test]
    fn hosted_on_ignores_scheme_and_case() {
        let img = ImageRef::parse("ghcr.io/acme/web:1.0").unwrap();
        assert!(img.is_hosted_on("https://GHCR.io/"));
        assert!(img.is_hosted_on("ghcr.io"));
    }

    #[test]
    fn rejects_dangling_separators() {
        assert!(ImageRef::parse("web:").is_err());
        assert!(ImageRef::parse("web@").is_err());
        assert!(ImageRef::parse("ghcr.io/").is_err());
    }
}
