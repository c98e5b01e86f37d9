// ABOUTME: Integration tests for config discovery, stack loading, and credential sources.
// ABOUTME: Works against real files in temporary directories.

use berth::config::*;
use berth::credentials::{CredentialError, CredentialProvider};
use berth::error::{EXIT_CONFIG, Error};
use berth::stack::StackDefinition;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

mod discovery {
    use super::*;

    #[test]
    fn finds_berth_yml_first() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "berth.yml", "registry: first.io");
        write(dir.path(), "berth.yaml", "registry: second.io");

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        assert_eq!(config.registry, "first.io");
    }

    #[test]
    fn finds_yaml_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "berth.yaml", "registry: second.io");

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        assert_eq!(config.registry, "second.io");
    }

    #[test]
    fn dot_berth_config_resolves_against_project_root() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".berth/config.yml",
            "registry: ghcr.io\nstack: deploy/stack.yml\nlock: { dir: state }",
        );

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        assert_eq!(config.stack_path(), dir.path().join("deploy/stack.yml"));
        assert_eq!(config.lock_dir(), Some(dir.path().join("state")));
    }

    #[test]
    fn missing_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = DeploymentConfig::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn unreadable_explicit_path_names_the_file() {
        let err = DeploymentConfig::load(Path::new("/nonexistent/berth.yml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/berth.yml"));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }
}

mod parsing {
    use super::*;

    #[test]
    fn full_config() {
        let yaml = r#"
stack: ./stack.yml
registry: ghcr.io
credentials:
  username: { env: REGISTRY_USER }
  token: { file: /run/secrets/registry_token }
runtime: { runtime: podman, socket: /run/podman/podman.sock }
timeouts: { login: 30s, pull: 10m, teardown: 2m, migrate: 1h, start: 1m, reclaim: none }
lock: { enabled: false }
reclaim: { mode: dangling, until: 24h }
stop: { timeout: 45s }
"#;
        let config = DeploymentConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.timeouts.login, Some(Duration::from_secs(30)));
        assert_eq!(config.timeouts.migrate, Some(Duration::from_secs(3600)));
        assert_eq!(config.timeouts.reclaim, None);
        assert!(!config.lock.enabled);
        assert_eq!(config.reclaim.mode, ReclaimMode::Dangling);
        assert_eq!(config.stop.timeout, Duration::from_secs(45));
        assert!(matches!(
            config.credentials.token,
            Some(CredentialSourceConfig::File { .. })
        ));
        assert_eq!(
            config.runtime.unwrap().socket.as_deref(),
            Some("/run/podman/podman.sock")
        );
    }

    #[test]
    fn unknown_reclaim_mode_is_rejected() {
        let err = DeploymentConfig::from_yaml("registry: r.io\nreclaim: { mode: everything }")
            .unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }
}

mod stack_files {
    use super::*;

    #[test]
    fn relative_stack_path_loads_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "berth.yml", "registry: ghcr.io\nstack: ./stack.yml");
        write(
            dir.path(),
            "stack.yml",
            "name: shop\nservices:\n  web:\n    image: ghcr.io/acme/shop-web:1.4.0\n",
        );

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        let stack = StackDefinition::load(&config.stack_path()).unwrap();
        assert_eq!(stack.name.as_str(), "shop");
        assert_eq!(stack.network_name(), "shop");
    }

    #[test]
    fn missing_stack_file_is_a_configuration_error() {
        let err = StackDefinition::load(Path::new("/nonexistent/stack.yml")).unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }));
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn stack_env_from_unset_variable_is_a_configuration_error() {
        let yaml = "name: shop\nservices:\n  web:\n    image: web:1\n    env:\n      DATABASE_URL: { env: BERTH_TEST_UNSET_DB }\n";
        let err = temp_env::with_var_unset("BERTH_TEST_UNSET_DB", || {
            StackDefinition::from_yaml(yaml)
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }
}

mod credential_sources {
    use super::*;

    #[tokio::test]
    async fn relative_token_file_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "secrets/token", "s3cret\n");
        write(
            dir.path(),
            "berth.yml",
            "registry: ghcr.io\ncredentials:\n  username: { env: BERTH_TEST_USER }\n  token: { file: secrets/token }\n",
        );
        let config = DeploymentConfig::discover(dir.path()).unwrap();
        let provider = CredentialProvider::from_config(&config);

        let credentials =
            temp_env::async_with_vars([("BERTH_TEST_USER", Some("ci-bot"))], provider.load())
                .await
                .unwrap();

        assert_eq!(credentials.username.expose(), "ci-bot");
        assert_eq!(credentials.token.expose(), "s3cret");
    }

    #[tokio::test]
    async fn empty_token_file_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let token = write(dir.path(), "token", "\n");
        let yaml = format!(
            "registry: ghcr.io\ncredentials:\n  username: {{ command: [echo, ci-bot] }}\n  token: {{ file: {} }}\n",
            token.display()
        );
        let config = DeploymentConfig::from_yaml(&yaml).unwrap();

        let err = CredentialProvider::from_config(&config)
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Missing { field: "token", .. }));
    }

    #[tokio::test]
    async fn unconfigured_username_is_missing() {
        let config = DeploymentConfig::from_yaml("registry: ghcr.io").unwrap();

        let err = CredentialProvider::from_config(&config)
            .load()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Missing {
                field: "username",
                ..
            }
        ));
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_loadable_files() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("shop"), Some("ghcr.io"), false).unwrap();

        let config = DeploymentConfig::discover(dir.path()).unwrap();
        assert_eq!(config.registry, "ghcr.io");
        assert!(config.credentials.username.is_some());
        assert!(config.credentials.token.is_some());

        let stack = temp_env::with_var("DATABASE_URL", Some("postgres://db/shop"), || {
            StackDefinition::load(&config.stack_path())
        })
        .unwrap();
        assert_eq!(stack.name.as_str(), "shop");
    }
}
