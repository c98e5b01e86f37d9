// ABOUTME: Pluggable sources for registry credential values.
// ABOUTME: Files, environment variables, and helper commands such as a vault CLI.

use async_trait::async_trait;
use nonempty::NonEmpty;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::CredentialSourceConfig;
use crate::types::Secret;

/// Why a source produced no value.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("environment variable {0} is not set")]
    NotSet(String),

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("command {program} failed: {reason}")]
    CommandFailed { program: String, reason: String },

    #[error("{0} produced an empty value")]
    Empty(String),
}

/// Somewhere a single credential value can be read from.
#[async_trait]
pub trait CredentialSource: fmt::Debug + Send + Sync {
    /// Read the value. Only the trailing line ending most files and commands
    /// end with is removed; other whitespace is part of the value.
    async fn read(&self) -> Result<Secret, SourceError>;

    /// Human-readable locator for messages, never the value.
    fn describe(&self) -> String;
}

fn non_empty(raw: &str, origin: String) -> Result<Secret, SourceError> {
    let trimmed = raw.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return Err(SourceError::Empty(origin));
    }
    Ok(Secret::new(trimmed))
}

/// A value already read from another source, kept for reuse.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    value: Secret,
    origin: String,
}

impl ResolvedSource {
    pub fn new(value: Secret, origin: String) -> Self {
        Self { value, origin }
    }
}

#[async_trait]
impl CredentialSource for ResolvedSource {
    async fn read(&self) -> Result<Secret, SourceError> {
        Ok(self.value.clone())
    }

    fn describe(&self) -> String {
        self.origin.clone()
    }
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialSource for FileSource {
    async fn read(&self) -> Result<Secret, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        non_empty(&raw, self.describe())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[derive(Debug, Clone)]
pub struct EnvSource {
    var: String,
}

impl EnvSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialSource for EnvSource {
    async fn read(&self) -> Result<Secret, SourceError> {
        let raw = std::env::var(&self.var).map_err(|_| SourceError::NotSet(self.var.clone()))?;
        non_empty(&raw, self.describe())
    }

    fn describe(&self) -> String {
        format!("environment variable {}", self.var)
    }
}

/// Runs a program and takes its standard output as the value.
#[derive(Debug, Clone)]
pub struct CommandSource {
    argv: NonEmpty<String>,
}

impl CommandSource {
    pub fn new(argv: NonEmpty<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl CredentialSource for CommandSource {
    async fn read(&self) -> Result<Secret, SourceError> {
        let program = self.argv.head.clone();
        tracing::debug!("running credential helper {}", program);

        let output = Command::new(&program)
            .args(&self.argv.tail)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SourceError::CommandFailed {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::CommandFailed {
                program,
                reason: match output.status.code() {
                    Some(code) => format!("exit code {code}: {}", stderr.trim()),
                    None => "terminated by signal".to_string(),
                },
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| SourceError::CommandFailed {
            program: program.clone(),
            reason: "output is not valid UTF-8".to_string(),
        })?;
        non_empty(&stdout, self.describe())
    }

    fn describe(&self) -> String {
        format!("command {}", self.argv.head)
    }
}

/// Build the source a config entry describes. Relative file paths are taken
/// as given; callers resolve them first.
pub fn from_config(config: &CredentialSourceConfig) -> Box<dyn CredentialSource> {
    match config {
        CredentialSourceConfig::File { file } => Box::new(FileSource::new(file.clone())),
        CredentialSourceConfig::Env { env } => Box::new(EnvSource::new(env.clone())),
        CredentialSourceConfig::Command { command } => Box::new(CommandSource::new(command.clone())),
    }
}
