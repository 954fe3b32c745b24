// ABOUTME: Local container runtime detection for Docker and Podman.
// ABOUTME: Checks Podman sockets first, then Docker; config overrides win.

use super::types::{RuntimeConfig, RuntimeHandle, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

/// Detect the container runtime on the local system.
///
/// Detection order (when not explicitly configured):
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
///
/// An explicit `config.runtime` takes precedence; its socket falls back
/// to the default path for that engine kind.
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<RuntimeHandle, DetectionError> {
    if let Some(cfg) = config
        && let Some(runtime_type) = cfg.runtime
    {
        let socket_path = cfg
            .socket
            .clone()
            .unwrap_or_else(|| default_socket_path(runtime_type));
        return Ok(RuntimeHandle {
            runtime_type,
            socket_path,
        });
    }

    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(RuntimeHandle {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(RuntimeHandle {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(RuntimeHandle {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_runtime_overrides_detection() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            socket: Some("/tmp/custom.sock".to_string()),
        };

        let handle = detect_local(Some(&config)).expect("override should always succeed");
        assert_eq!(handle.runtime_type, RuntimeType::Docker);
        assert_eq!(handle.socket_path, "/tmp/custom.sock");
    }

    #[test]
    fn explicit_runtime_without_socket_uses_default() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Podman),
            socket: None,
        };

        let handle = detect_local(Some(&config)).expect("override should always succeed");
        assert_eq!(handle.runtime_type, RuntimeType::Podman);
        assert_eq!(handle.socket_path, ROOTFUL_PODMAN);
    }
}
