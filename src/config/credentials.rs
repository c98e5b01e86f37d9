// ABOUTME: Where registry credentials come from.
// ABOUTME: Each field names a file, an environment variable, or a helper command.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

use super::deserialize::deserialize_nonempty;

/// Locators for the registry username and token.
///
/// Both are optional at parse time so that a missing source surfaces as a
/// credential failure of the authentication step rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: Option<CredentialSourceConfig>,

    #[serde(default)]
    pub token: Option<CredentialSourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CredentialSourceConfig {
    File {
        file: PathBuf,
    },
    Env {
        env: String,
    },
    Command {
        #[serde(deserialize_with = "deserialize_nonempty")]
        command: NonEmpty<String>,
    },
}
