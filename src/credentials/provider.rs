// ABOUTME: Registry authentication from configured credential sources.
// ABOUTME: Produces an opaque Session that image pulls require.

use std::fmt;

use crate::config::{CredentialsConfig, DeploymentConfig};
use crate::runtime::{RegistryAuth, RegistryError, RegistryOps};
use crate::types::{DEFAULT_REGISTRY, ImageRef, Secret, normalize_registry};

use super::source::{self, CredentialSource, ResolvedSource};
use super::{CredentialError, CredentialSet};

/// Login endpoint Docker Hub expects in auth payloads.
const DOCKER_HUB_AUTH_SERVER: &str = "https://index.docker.io/v1/";

/// Proof that the registry accepted our credentials.
///
/// Only the image fetcher reads the auth material inside; `Debug` shows the
/// registry and nothing else.
pub struct Session {
    registry: String,
    auth: RegistryAuth,
}

impl Session {
    /// Registry this session is valid for.
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Whether `image` is pulled from this session's registry.
    pub fn covers(&self, image: &ImageRef) -> bool {
        image.is_hosted_on(&self.registry)
    }

    pub(crate) fn auth(&self) -> &RegistryAuth {
        &self.auth
    }

    /// Remove every credential value from an engine message.
    pub fn scrub(&self, text: &str) -> String {
        let text = scrub_auth(&self.auth, text);
        match &self.auth.identity_token {
            Some(token) => token.scrub(&text),
            None => text,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Resolves credentials and logs in to one registry.
#[derive(Debug)]
pub struct CredentialProvider {
    registry: String,
    username: Option<Box<dyn CredentialSource>>,
    token: Option<Box<dyn CredentialSource>>,
}

impl CredentialProvider {
    pub fn new(
        registry: impl Into<String>,
        username: Option<Box<dyn CredentialSource>>,
        token: Option<Box<dyn CredentialSource>>,
    ) -> Self {
        Self {
            registry: registry.into(),
            username,
            token,
        }
    }

    /// Build a provider from the deployment config's credential locators.
    pub fn from_config(config: &DeploymentConfig) -> Self {
        let CredentialsConfig { username, token } = &config.credentials;
        let build = |locator: &Option<crate::config::CredentialSourceConfig>| {
            locator
                .as_ref()
                .map(|l| source::from_config(&config.resolve_locator(l)))
        };
        Self::new(config.registry.clone(), build(username), build(token))
    }

    /// Read both credential values without touching the registry.
    pub async fn load(&self) -> Result<CredentialSet, CredentialError> {
        let username = read_field("username", self.username.as_deref()).await?;
        let token = read_field("token", self.token.as_deref()).await?;
        Ok(CredentialSet { username, token })
    }

    /// Read every source now and keep the values.
    ///
    /// Later calls to [`load`](Self::load) and
    /// [`authenticate`](Self::authenticate) reuse them, so helper commands
    /// run once per deploy.
    pub async fn resolve(self) -> Result<Self, CredentialError> {
        let username = resolve_field("username", self.username).await?;
        let token = resolve_field("token", self.token).await?;
        Ok(Self {
            registry: self.registry,
            username: Some(username),
            token: Some(token),
        })
    }

    /// Load credentials and log in exactly once.
    ///
    /// Nothing is sent to the runtime when a credential is missing.
    pub async fn authenticate<R: RegistryOps + ?Sized>(
        &self,
        runtime: &R,
    ) -> Result<Session, CredentialError> {
        let credentials = self.load().await?;
        let auth = RegistryAuth {
            username: credentials.username,
            password: credentials.token,
            server: auth_server(&self.registry),
            identity_token: None,
        };

        tracing::debug!("logging in to {}", self.registry);
        match runtime.login(&auth).await {
            Ok(grant) => {
                tracing::info!("registry {}: {}", self.registry, grant.status);
                Ok(Session {
                    registry: self.registry.clone(),
                    auth: RegistryAuth {
                        identity_token: grant.identity_token,
                        ..auth
                    },
                })
            }
            Err(RegistryError::Rejected(msg)) => {
                Err(CredentialError::Rejected(scrub_auth(&auth, &msg)))
            }
            Err(RegistryError::Unreachable(msg) | RegistryError::Runtime(msg)) => {
                Err(CredentialError::Unreachable(scrub_auth(&auth, &msg)))
            }
        }
    }
}

async fn read_field(
    field: &'static str,
    source: Option<&dyn CredentialSource>,
) -> Result<Secret, CredentialError> {
    let source = source.ok_or_else(|| CredentialError::Missing {
        field,
        reason: "no source configured".to_string(),
    })?;
    source.read().await.map_err(|e| CredentialError::Missing {
        field,
        reason: e.to_string(),
    })
}

async fn resolve_field(
    field: &'static str,
    source: Option<Box<dyn CredentialSource>>,
) -> Result<Box<dyn CredentialSource>, CredentialError> {
    let value = read_field(field, source.as_deref()).await?;
    let origin = source.map(|s| s.describe()).unwrap_or_default();
    Ok(Box::new(ResolvedSource::new(value, origin)))
}

/// Token first: a username contained in the token must not leave a fragment behind.
fn scrub_auth(auth: &RegistryAuth, text: &str) -> String {
    auth.username.scrub(&auth.password.scrub(text))
}

fn auth_server(registry: &str) -> String {
    if normalize_registry(registry) == DEFAULT_REGISTRY {
        DOCKER_HUB_AUTH_SERVER.to_string()
    } else {
        registry.to_string()
    }
}
