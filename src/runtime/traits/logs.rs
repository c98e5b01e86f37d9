// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Stream container output, used to explain why a one-off container failed.

use crate::types::ContainerId;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

pub type LogLineStream = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

/// Log streaming operations.
#[async_trait]
pub trait LogOps: Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError>;

    /// Collect the last `lines` lines of a container's combined output.
    async fn tail_logs(&self, id: &ContainerId, lines: u64) -> Result<String, LogError> {
        let mut stream = self.container_logs(id, &LogOptions::tail(lines)).await?;
        let mut out = String::new();
        while let Some(line) = stream.next().await {
            out.push_str(&line?.content);
        }
        Ok(out)
    }
}

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    /// Follow log output (like `tail -f`).
    pub follow: bool,
    pub timestamps: bool,
    /// Number of lines to show from the end (`None` = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Create options for reading the last N lines of both streams.
    pub fn tail(n: u64) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            tail: Some(n),
        }
    }
}

/// A single chunk of container output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),
}
