// ABOUTME: Configuration types and parsing for berth.yml.
// ABOUTME: Handles YAML parsing, config discovery, and command-line overrides.

mod credentials;
pub(crate) mod deserialize;
mod env_value;
mod init;
mod restart_policy;
mod stop;
mod timeouts;

pub use credentials::{CredentialSourceConfig, CredentialsConfig};
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use restart_policy::RestartPolicy;
pub use stop::StopConfig;
pub use timeouts::StepTimeouts;

use crate::error::{Error, Result};
use crate::runtime::{PruneFilters, RuntimeConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "berth.yml";
pub const CONFIG_FILENAME_ALT: &str = "berth.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".berth/config.yml";

/// Everything one `berth deploy` invocation needs to know.
///
/// Built once (file, then command-line overrides) and only borrowed after that.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// Path to the stack definition.
    #[serde(default = "default_stack_path")]
    pub stack: PathBuf,

    /// Registry endpoint, `host[:port]`, scheme optional.
    pub registry: String,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,

    #[serde(default)]
    pub timeouts: StepTimeouts,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub reclaim: ReclaimConfig,

    #[serde(default)]
    pub stop: StopConfig,

    /// Directory relative stack paths are resolved against.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

fn default_stack_path() -> PathBuf {
    PathBuf::from("stack.yml")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding lock files (default `$HOME/.local/state/berth`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Which images are reclaimed after a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReclaimMode {
    /// Every image no container uses.
    #[default]
    Unused,
    /// Only untagged images.
    Dangling,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReclaimConfig {
    #[serde(default)]
    pub mode: ReclaimMode,

    /// Keep images younger than this.
    #[serde(default, with = "humantime_serde")]
    pub until: Option<Duration>,
}

impl ReclaimConfig {
    pub fn prune_filters(&self) -> PruneFilters {
        PruneFilters {
            dangling_only: self.mode == ReclaimMode::Dangling,
            older_than: self.until,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub stack: Option<PathBuf>,
    pub registry: Option<String>,
    pub no_lock: bool,
}

impl DeploymentConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path.parent().map(|dir| {
            // `.berth/config.yml` lives one level below the project root
            if dir.file_name().is_some_and(|name| name == ".berth") {
                dir.parent().unwrap_or(dir).to_path_buf()
            } else {
                dir.to_path_buf()
            }
        });
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply command-line overrides. Consumes the config so the result is the
    /// final value for this invocation.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(stack) = overrides.stack {
            self.stack = stack;
        }
        if let Some(registry) = overrides.registry {
            self.registry = registry;
        }
        if overrides.no_lock {
            self.lock.enabled = false;
        }
        self.validate()?;
        Ok(self)
    }

    /// Stack definition path, resolved against the config file's directory.
    pub fn stack_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(base) if self.stack.is_relative() => base.join(&self.stack),
            _ => self.stack.clone(),
        }
    }

    /// Configured lock directory, resolved like the stack path. `None` means
    /// the per-user default.
    pub fn lock_dir(&self) -> Option<PathBuf> {
        let dir = self.lock.dir.as_ref()?;
        Some(match &self.base_dir {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.clone(),
        })
    }

    /// Credential locator with a relative file path resolved like the stack path.
    pub fn resolve_locator(&self, locator: &CredentialSourceConfig) -> CredentialSourceConfig {
        match (locator, &self.base_dir) {
            (CredentialSourceConfig::File { file }, Some(base)) if file.is_relative() => {
                CredentialSourceConfig::File {
                    file: base.join(file),
                }
            }
            _ => locator.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.registry.trim().is_empty() {
            return Err(Error::InvalidConfig("registry cannot be empty".into()));
        }
        if self.stack.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("stack path cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = DeploymentConfig::from_yaml("registry: ghcr.io").unwrap();
        assert_eq!(config.stack, PathBuf::from("stack.yml"));
        assert!(config.lock.enabled);
        assert_eq!(config.reclaim.mode, ReclaimMode::Unused);
        assert_eq!(config.stop.timeout, Duration::from_secs(30));
        assert_eq!(config.timeouts, StepTimeouts::default());
    }

    #[test]
    fn empty_registry_is_invalid() {
        assert!(matches!(
            DeploymentConfig::from_yaml("registry: ''"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = DeploymentConfig::from_yaml("registry: ghcr.io\nstack: a.yml")
            .unwrap()
            .with_overrides(Overrides {
                stack: Some(PathBuf::from("/srv/b.yml")),
                registry: Some("registry.example.com:5000".into()),
                no_lock: true,
            })
            .unwrap();
        assert_eq!(config.stack_path(), PathBuf::from("/srv/b.yml"));
        assert_eq!(config.registry, "registry.example.com:5000");
        assert!(!config.lock.enabled);
    }

    #[test]
    fn dangling_mode_maps_to_prune_filters() {
        let config =
            DeploymentConfig::from_yaml("registry: r.io\nreclaim: { mode: dangling, until: 24h }")
                .unwrap();
        let filters = config.reclaim.prune_filters();
        assert!(filters.dangling_only);
        assert_eq!(filters.older_than, Some(Duration::from_secs(86400)));
    }
}
