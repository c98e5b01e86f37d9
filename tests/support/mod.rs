// ABOUTME: Test support utilities.
// ABOUTME: Provides the recording fake runtime and fixtures for pipeline tests.

use std::sync::Once;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runtime;

use async_trait::async_trait;
use berth::config::DeploymentConfig;
use berth::credentials::{CredentialProvider, CredentialSource, SourceError};
use berth::stack::StackDefinition;
use berth::types::Secret;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("berth=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A credential source with a fixed value.
#[derive(Debug)]
pub struct Fixed(pub &'static str);

#[async_trait]
impl CredentialSource for Fixed {
    async fn read(&self) -> Result<Secret, SourceError> {
        Ok(Secret::new(self.0))
    }

    fn describe(&self) -> String {
        "fixed value".to_string()
    }
}

/// Provider for ghcr.io; `token: None` leaves the token source unconfigured.
#[allow(dead_code)]
pub fn provider(token: Option<&'static str>) -> CredentialProvider {
    CredentialProvider::new(
        "ghcr.io",
        Some(Box::new(Fixed("ci-bot")) as Box<dyn CredentialSource>),
        token.map(|t| Box::new(Fixed(t)) as Box<dyn CredentialSource>),
    )
}

#[allow(dead_code)]
pub fn config() -> DeploymentConfig {
    DeploymentConfig::from_yaml("registry: ghcr.io\nreclaim: { mode: unused }\n").unwrap()
}

/// A `shop` stack with `services` services (`svc-0`, `svc-1`, ...) and a
/// migration borrowing `svc-0` when `migration` is set.
#[allow(dead_code)]
pub fn stack(services: usize, migration: bool) -> StackDefinition {
    let mut yaml = String::from("name: shop\nservices:\n");
    for i in 0..services {
        yaml.push_str(&format!(
            "  svc-{i}:\n    image: ghcr.io/acme/svc-{i}:1.0.0\n    env:\n      MODE: production\n"
        ));
    }
    if migration {
        yaml.push_str("migration:\n  service: svc-0\n  command: [\"./manage\", \"migrate\"]\n");
    }
    StackDefinition::from_yaml(&yaml).unwrap()
}

/// The 3-service stack used for the end-to-end scenarios.
#[allow(dead_code)]
pub fn shop_stack() -> StackDefinition {
    StackDefinition::from_yaml(
        r#"
name: shop
services:
  web:
    image: ghcr.io/acme/shop-web:1.4.0
    ports: ["8080:80"]
  worker:
    image: ghcr.io/acme/shop-worker:1.4.0
  cache:
    image: redis:7
migration:
  service: web
  command: ["./manage", "migrate"]
"#,
    )
    .unwrap()
}
