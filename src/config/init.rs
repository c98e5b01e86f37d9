// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates berth.yml and stack.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::StackName;

use super::CONFIG_FILENAME;

const STACK_FILENAME: &str = "stack.yml";
const DEFAULT_STACK_NAME: &str = "my-app";
const DEFAULT_REGISTRY: &str = "ghcr.io";

pub fn init_config(
    dir: &Path,
    stack_name: Option<&str>,
    registry: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);
    let stack_path = dir.join(STACK_FILENAME);

    for path in [&config_path, &stack_path] {
        if path.exists() && !force {
            return Err(Error::AlreadyExists(path.clone()));
        }
    }

    let name = StackName::new(stack_name.unwrap_or(DEFAULT_STACK_NAME))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let registry = registry.unwrap_or(DEFAULT_REGISTRY);
    if registry.trim().is_empty() {
        return Err(Error::InvalidConfig("registry cannot be empty".into()));
    }

    std::fs::write(&config_path, config_template(registry))?;
    std::fs::write(&stack_path, stack_template(&name, registry))?;

    Ok(())
}

fn config_template(registry: &str) -> String {
    format!(
        r#"stack: ./{STACK_FILENAME}
registry: {registry}
credentials:
  username: {{ env: REGISTRY_USER }}
  token: {{ env: REGISTRY_TOKEN }}
  # token: {{ file: /run/secrets/registry_token }}
  # token: {{ command: [pass, show, registry/token] }}
timeouts:
  pull: 15m
  migrate: 30m
reclaim:
  mode: unused
"#
    )
}

fn stack_template(name: &StackName, registry: &str) -> String {
    format!(
        r#"name: {name}
services:
  web:
    image: {registry}/{name}-web:latest
    ports: ["8080:80"]
    env:
      DATABASE_URL: {{ env: DATABASE_URL }}
migration:
  service: web
  command: ["./migrate"]
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::stack::StackDefinition;

    #[test]
    fn templates_parse() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("shop"), Some("registry.example.com"), false).unwrap();

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        assert_eq!(config.registry, "registry.example.com");

        let stack = temp_env::with_var("DATABASE_URL", Some("postgres://db/shop"), || {
            StackDefinition::load(&config.stack_path())
        })
        .unwrap();
        assert_eq!(stack.name.as_str(), "shop");
        assert!(stack.migration.is_some());
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STACK_FILENAME), "name: keep").unwrap();

        let err = init_config(dir.path(), None, None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(STACK_FILENAME)).unwrap(),
            "name: keep"
        );

        init_config(dir.path(), None, None, true).unwrap();
    }

    #[test]
    fn rejects_invalid_stack_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            init_config(dir.path(), Some("Bad_Name"), None, false),
            Err(Error::InvalidConfig(_))
        ));
    }
}
