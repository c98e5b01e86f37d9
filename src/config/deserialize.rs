// ABOUTME: Custom serde deserializers for config and stack types.
// ABOUTME: Handles non-empty command lines, port mappings, volume mounts, and memory sizes.

use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer};

use crate::runtime::{PortMapping, Protocol, VolumeMount};

pub fn deserialize_nonempty<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values).ok_or_else(|| serde::de::Error::custom("command cannot be empty"))
}

pub fn deserialize_ports<'de, D>(deserializer: D) -> Result<Vec<PortMapping>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs: Vec<String> = Vec::deserialize(deserializer)?;
    specs
        .iter()
        .map(|spec| {
            parse_port_mapping(spec)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid port mapping: {spec}")))
        })
        .collect()
}

pub fn deserialize_volumes<'de, D>(deserializer: D) -> Result<Vec<VolumeMount>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs: Vec<String> = Vec::deserialize(deserializer)?;
    specs
        .iter()
        .map(|spec| {
            parse_volume_mount(spec)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid volume mount: {spec}")))
        })
        .collect()
}

pub fn deserialize_memory<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let spec: Option<String> = Option::deserialize(deserializer)?;
    spec.map(|s| {
        parse_memory_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid memory size: {s}")))
    })
    .transpose()
}

/// Parse a volume mount string like "source:target" or "source:target:ro".
pub fn parse_volume_mount(spec: &str) -> Option<VolumeMount> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, read_only) = match parts.as_slice() {
        [source, target] => (*source, *target, false),
        [source, target, "ro"] => (*source, *target, true),
        [source, target, "rw"] => (*source, *target, false),
        _ => return None,
    };
    if source.is_empty() || !target.starts_with('/') {
        return None;
    }
    Some(VolumeMount {
        source: source.to_string(),
        target: target.to_string(),
        read_only,
    })
}

/// Parse a port mapping string like "80", "8080:80", "127.0.0.1:8080:80" or "53:53/udp".
pub fn parse_port_mapping(spec: &str) -> Option<PortMapping> {
    let (port_part, protocol) = match spec.split_once('/') {
        Some((ports, "tcp")) => (ports, Protocol::Tcp),
        Some((ports, "udp")) => (ports, Protocol::Udp),
        Some(_) => return None,
        None => (spec, Protocol::Tcp),
    };

    let parts: Vec<&str> = port_part.split(':').collect();
    match parts.as_slice() {
        [container] => Some(PortMapping {
            host_port: None,
            container_port: container.parse().ok()?,
            protocol,
            host_ip: None,
        }),
        [host, container] => Some(PortMapping {
            host_port: Some(host.parse().ok()?),
            container_port: container.parse().ok()?,
            protocol,
            host_ip: None,
        }),
        [ip, host, container] => Some(PortMapping {
            host_port: Some(host.parse().ok()?),
            container_port: container.parse().ok()?,
            protocol,
            host_ip: Some(ip.to_string()),
        }),
        _ => None,
    }
}

/// Parse a memory string like "512m" or "1g" into bytes.
pub fn parse_memory_string(spec: &str) -> Option<u64> {
    let spec = spec.trim().to_lowercase();
    let spec = spec.strip_suffix('b').unwrap_or(&spec);
    let (num_str, multiplier) = match spec.char_indices().last()? {
        (i, 'g') => (&spec[..i], 1024 * 1024 * 1024),
        (i, 'm') => (&spec[..i], 1024 * 1024),
        (i, 'k') => (&spec[..i], 1024),
        _ => (spec, 1),
    };

    num_str.parse::<u64>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_mapping_forms() {
        let p = parse_port_mapping("8080:80").unwrap();
        assert_eq!((p.host_port, p.container_port), (Some(8080), 80));

        let p = parse_port_mapping("127.0.0.1:5432:5432").unwrap();
        assert_eq!(p.host_ip.as_deref(), Some("127.0.0.1"));

        let p = parse_port_mapping("53/udp").unwrap();
        assert_eq!(p.protocol, Protocol::Udp);
        assert_eq!(p.host_port, None);

        assert!(parse_port_mapping("80/sctp").is_none());
        assert!(parse_port_mapping("http:80").is_none());
    }

    #[test]
    fn volume_mount_forms() {
        let v = parse_volume_mount("pgdata:/var/lib/postgresql/data").unwrap();
        assert!(!v.is_bind());
        assert!(!v.read_only);

        let v = parse_volume_mount("./config:/etc/app:ro").unwrap();
        assert!(v.is_bind());
        assert!(v.read_only);

        assert!(parse_volume_mount("data").is_none());
        assert!(parse_volume_mount("data:relative/path").is_none());
    }

    #[test]
    fn memory_sizes() {
        assert_eq!(parse_memory_string("512m"), Some(512 * 1024 * 1024));
        assert_eq!(parse_memory_string("1G"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_memory_string("64kb"), Some(64 * 1024));
        assert_eq!(parse_memory_string("1000"), Some(1000));
        assert_eq!(parse_memory_string("lots"), None);
        assert_eq!(parse_memory_string(""), None);
    }
}
