// ABOUTME: Stack definition parsing for stack.yml.
// ABOUTME: Validates services and the migration, and builds their container configurations.

pub mod labels;
mod service;

pub use service::{
    MigrationSpec, ResourcesSpec, ServiceSpec, migration_container_name, service_container_name,
};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::config::resolve_env_map;
use crate::error::{Error, Result};
use crate::runtime::ContainerConfig;
use crate::types::{ImageRef, NetworkAlias, ServiceName, StackName};

/// A parsed and validated `stack.yml`.
///
/// Services are kept in a `BTreeMap`, so they are always started in name order.
#[derive(Debug, Clone, Deserialize)]
pub struct StackDefinition {
    pub name: StackName,

    /// Network the stack's containers share; defaults to the stack name.
    #[serde(default)]
    network: Option<String>,

    pub services: BTreeMap<ServiceName, ServiceSpec>,

    #[serde(default)]
    pub migration: Option<MigrationSpec>,
}

impl StackDefinition {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let stack: Self = serde_yaml::from_str(yaml)?;
        stack.validate()?;
        Ok(stack)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let stack = Self::from_yaml(&content)?;
        tracing::debug!(
            "loaded stack {} with {} service(s) from {}",
            stack.name,
            stack.services.len(),
            path.display()
        );
        Ok(stack)
    }

    pub fn network_name(&self) -> &str {
        self.network.as_deref().unwrap_or(self.name.as_str())
    }

    /// Every distinct image the stack references, services first.
    pub fn images(&self) -> Vec<&ImageRef> {
        let mut images: Vec<&ImageRef> = Vec::new();
        let candidates = self
            .services
            .values()
            .map(|s| &s.image)
            .chain(self.migration_image());
        for image in candidates {
            if !images.contains(&image) {
                images.push(image);
            }
        }
        images
    }

    /// Image the migration runs, if there is a migration.
    pub fn migration_image(&self) -> Option<&ImageRef> {
        let migration = self.migration.as_ref()?;
        match (&migration.image, &migration.service) {
            (Some(image), _) => Some(image),
            (None, Some(service)) => self.services.get(service).map(|s| &s.image),
            (None, None) => None,
        }
    }

    /// Container configuration for one service.
    pub fn service_config(
        &self,
        service: &ServiceName,
        stop_timeout: Duration,
    ) -> Result<ContainerConfig> {
        let spec = self
            .services
            .get(service)
            .ok_or_else(|| Error::InvalidStack(format!("unknown service: {service}")))?;
        spec.container_config(&self.name, service, self.network_name(), stop_timeout)
    }

    /// Container configuration for the migration, `None` without a migration.
    pub fn migration_config(&self) -> Result<Option<ContainerConfig>> {
        let Some(migration) = self.migration.as_ref() else {
            return Ok(None);
        };
        let image = self
            .migration_image()
            .ok_or_else(|| Error::InvalidStack("migration has no image".into()))?;
        let borrowed = migration
            .service
            .as_ref()
            .and_then(|name| self.services.get(name));

        migration
            .container_config(&self.name, image, borrowed, self.network_name())
            .map(Some)
    }

    fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(Error::InvalidStack(format!(
                "stack {} defines no services",
                self.name
            )));
        }

        if let Some(network) = &self.network {
            NetworkAlias::new(network)
                .map_err(|e| Error::InvalidStack(format!("network {network:?}: {e}")))?;
        }

        if let Some(migration) = &self.migration {
            match (&migration.service, &migration.image) {
                (Some(_), Some(_)) => {
                    return Err(Error::InvalidStack(
                        "migration takes either service or image, not both".into(),
                    ));
                }
                (None, None) => {
                    return Err(Error::InvalidStack(
                        "migration needs a service or an image".into(),
                    ));
                }
                (Some(service), None) if !self.services.contains_key(service) => {
                    return Err(Error::InvalidStack(format!(
                        "migration refers to unknown service {service}"
                    )));
                }
                _ => {}
            }
            resolve_env_map(&migration.env)?;
        }

        for spec in self.services.values() {
            resolve_env_map(&spec.env)?;
        }

        Ok(())
    }
}
