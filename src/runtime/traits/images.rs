// ABOUTME: The engine-agnostic image adapter contract and error taxonomy.
// ABOUTME: Every engine adapter implements ImageRuntime.

use super::sealed::Sealed;
use super::shared_types::{
    AuthConfig, BasicImageInfo, ImageHistory, ImageIdentity, ImageInfo, PullImageOptions,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Errors surfaced by image adapter operations.
///
/// Engine-specific failures never cross this boundary: adapters either
/// reclassify them (`NotFound`, `BadParam`, `MissingAuthConfig`) or wrap
/// them with operation context (`Provider`).
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("no registry auth config found for {0}")]
    MissingAuthConfig(String),

    #[error("connection to runtime failed: {0}")]
    ConnectionFailed(String),

    #[error("{context}: {message}")]
    Provider { context: String, message: String },
}

impl ImageError {
    pub(crate) fn provider(
        context: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Provider {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Engine-agnostic image operations.
///
/// Each call awaits one engine round-trip and returns on completion or
/// error; the contract carries no shared mutable state, performs no
/// internal retries, and leaves retry/backoff policy to the caller.
/// Concurrent use is safe exactly when the wrapped engine client is.
#[async_trait]
pub trait ImageRuntime: Sealed + Send + Sync {
    /// Check whether an image exists locally. Never downloads anything.
    async fn has_image(&self, image_ref: &str) -> Result<ImageIdentity, ImageError>;

    /// List every image known to the engine, unfiltered.
    async fn list_images_all(&self) -> Result<Vec<BasicImageInfo>, ImageError>;

    /// List images keyed by de-duplicated `repo:tag` name.
    ///
    /// Name filtering is delegated to the engine; an empty filter lists
    /// everything. The map carries no defined iteration order.
    async fn list_images(
        &self,
        name_filter: &str,
    ) -> Result<HashMap<String, BasicImageInfo>, ImageError>;

    /// Inspect an image. Run/health configuration blocks are populated
    /// only when the engine reports them; their absence is not an error.
    async fn inspect_image(&self, image_ref: &str) -> Result<ImageInfo, ImageError>;

    /// Pull an image, optionally authenticated.
    ///
    /// `auth` must have been minted by this adapter's
    /// [`registry_auth_config`](Self::registry_auth_config); a handle
    /// from a different engine fails with [`ImageError::BadParam`].
    async fn pull_image(
        &self,
        opts: PullImageOptions,
        auth: Option<&AuthConfig>,
    ) -> Result<(), ImageError>;

    /// Resolve registry credentials.
    ///
    /// Sources are tried in priority order with short-circuiting:
    /// explicit account/secret, then an explicit config file, then the
    /// platform credential helper, then the default engine config file.
    async fn registry_auth_config(
        &self,
        account: &str,
        secret: &str,
        config_path: &str,
        registry: &str,
    ) -> Result<AuthConfig, ImageError>;

    /// Save an image archive to `local_path`.
    ///
    /// With `extract`, the archive is unpacked next to it; `remove_orig`
    /// deletes the archive only after a successful extraction.
    async fn save_image(
        &self,
        image_ref: &str,
        local_path: &Path,
        extract: bool,
        remove_orig: bool,
    ) -> Result<(), ImageError>;

    /// Layer history of an image, in the order the engine reports it.
    async fn image_history(&self, image_ref: &str) -> Result<Vec<ImageHistory>, ImageError>;
}
