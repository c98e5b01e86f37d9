// ABOUTME: Runtime detection on the local host.
// ABOUTME: Honours explicit config, otherwise checks Podman sockets first, then Docker.

use super::types::{DetectedRuntime, RuntimeConfig, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured runtime socket does not exist: {0}")]
    SocketMissing(String),
}

/// Find the container runtime socket to deploy through.
///
/// Detection order (when not explicitly configured):
/// 1. Rootless Podman socket (`$XDG_RUNTIME_DIR/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_runtime(config: Option<&RuntimeConfig>) -> Result<DetectedRuntime, DetectionError> {
    if let Some(cfg) = config {
        match (cfg.runtime, cfg.socket.as_deref()) {
            (Some(runtime_type), socket) => {
                let socket_path = socket
                    .map(str::to_string)
                    .unwrap_or_else(|| default_socket_path(runtime_type));
                return existing(runtime_type, socket_path);
            }
            (None, Some(socket)) => {
                // A socket without a type: guess from the path.
                let runtime_type = if socket.contains("podman") {
                    RuntimeType::Podman
                } else {
                    RuntimeType::Docker
                };
                return existing(runtime_type, socket.to_string());
            }
            (None, None) => {}
        }
    }

    if let Some(rootless) = rootless_podman_socket()
        && Path::new(&rootless).exists()
    {
        return Ok(DetectedRuntime {
            runtime_type: RuntimeType::Podman,
            socket_path: rootless,
        });
    }

    for (runtime_type, socket) in [
        (RuntimeType::Podman, ROOTFUL_PODMAN),
        (RuntimeType::Docker, DOCKER_SOCKET),
    ] {
        if Path::new(socket).exists() {
            return Ok(DetectedRuntime {
                runtime_type,
                socket_path: socket.to_string(),
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

fn existing(runtime_type: RuntimeType, socket_path: String) -> Result<DetectedRuntime, DetectionError> {
    if !Path::new(&socket_path).exists() {
        return Err(DetectionError::SocketMissing(socket_path));
    }
    Ok(DetectedRuntime {
        runtime_type,
        socket_path,
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => {
            rootless_podman_socket().unwrap_or_else(|| ROOTFUL_PODMAN.to_string())
        }
    }
}

fn rootless_podman_socket() -> Option<String> {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Some(format!("{dir}/podman/podman.sock"));
    }
    current_uid().map(|uid| format!("/run/user/{uid}/podman/podman.sock"))
}

fn current_uid() -> Option<String> {
    std::fs::read_to_string("/proc/self/status").ok().and_then(|s| {
        s.lines()
            .find(|l| l.starts_with("Uid:"))
            .and_then(|l| l.split_whitespace().nth(1))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_socket_is_reported() {
        let cfg = RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            socket: Some("/nonexistent/docker.sock".to_string()),
        };
        let err = detect_runtime(Some(&cfg)).unwrap_err();
        assert!(matches!(err, DetectionError::SocketMissing(p) if p == "/nonexistent/docker.sock"));
    }

    #[test]
    fn explicit_socket_infers_podman_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("podman.sock");
        std::fs::write(&socket, b"").unwrap();

        let cfg = RuntimeConfig {
            runtime: None,
            socket: Some(socket.display().to_string()),
        };
        let detected = detect_runtime(Some(&cfg)).unwrap();
        assert_eq!(detected.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn rootless_socket_prefers_xdg_runtime_dir() {
        temp_env::with_var("XDG_RUNTIME_DIR", Some("/run/user/4242"), || {
            assert_eq!(
                rootless_podman_socket().as_deref(),
                Some("/run/user/4242/podman/podman.sock")
            );
        });
    }
}
