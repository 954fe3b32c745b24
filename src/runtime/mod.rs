// ABOUTME: Engine-agnostic container image runtime layer.
// ABOUTME: Adapter contract, neutral model, detection, and the bollard adapter.

mod archive;
mod bollard;
mod credentials;
mod detection;
mod traits;
mod types;

pub use bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeHandle, RuntimeType};

/// Connect to the local container engine.
///
/// Detects the engine socket (honoring any explicit `config` override)
/// and returns the adapter for it. This is the configuration-time
/// factory; everything past it goes through [`ImageRuntime`].
pub fn connect_local(config: Option<&RuntimeConfig>) -> Result<BollardRuntime, ImageError> {
    let handle = detect_local(config).map_err(|e| ImageError::ConnectionFailed(e.to_string()))?;
    BollardRuntime::connect(&handle)
}
