// ABOUTME: Runtime kind definitions for Docker and Podman.
// ABOUTME: Includes RuntimeType enum, RuntimeHandle, and RuntimeConfig.

use serde::{Deserialize, Serialize};

/// The container engine kind an adapter speaks to.
///
/// Also serves as the tag on credential handles, so that a credential
/// minted for one engine is rejected by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A detected (or explicitly configured) engine endpoint.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    /// The kind of engine behind the socket.
    pub runtime_type: RuntimeType,
    /// Path to the engine's API socket.
    pub socket_path: String,
}

/// Configuration for explicit runtime selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit engine kind (overrides auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit socket path (overrides the kind's default).
    pub socket: Option<String>,
}
