// ABOUTME: The neutral image model shared by all engine adapters.
// ABOUTME: ImageIdentity, BasicImageInfo, ImageInfo, AuthConfig, etc.

use crate::runtime::types::RuntimeType;
use crate::types::ImageRef;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Write;

/// Identity of an image known to the engine.
///
/// `id` is always non-empty when an identity is returned successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageIdentity {
    /// Content-addressed digest of the image.
    pub id: String,
    /// Tag portion of each repo tag (e.g. "latest" for "app:latest").
    pub short_tags: Vec<String>,
    /// Full repo tags as reported by the engine.
    pub repo_tags: Vec<String>,
    /// Shortened digest of each repo digest.
    pub short_digests: Vec<String>,
    /// Full repo digests as reported by the engine.
    pub repo_digests: Vec<String>,
}

/// Lightweight image record used for listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicImageInfo {
    pub id: String,
    /// Size in bytes, non-negative.
    pub size: i64,
    /// Creation time as Unix epoch seconds.
    pub created: i64,
    pub virtual_size: Option<i64>,
    pub parent_id: String,
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// Full image record returned by inspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInfo {
    /// Name of the engine that produced this record (e.g. "docker").
    pub runtime_name: String,
    /// Engine version that built the image.
    pub runtime_version: String,
    pub id: String,
    pub size: i64,
    pub created: i64,
    pub virtual_size: Option<i64>,
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
    pub os: String,
    pub architecture: String,
    pub author: String,
    /// Run defaults baked into the image; absent when the engine reports
    /// no configuration block.
    pub config: Option<RunConfig>,
}

/// Process and environment defaults baked into an image.
///
/// Exclusively owned by the [`ImageInfo`] that holds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub user: String,
    pub env: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    /// Ports the image declares, as "port/proto" strings; absent when the
    /// engine reports none.
    pub exposed_ports: Option<BTreeSet<String>>,
    pub volumes: Option<BTreeSet<String>>,
    pub working_dir: String,
    pub labels: HashMap<String, String>,
    pub healthcheck: Option<HealthConfig>,
    pub hostname: String,
    pub domainname: String,
    pub image: String,
    pub on_build: Vec<String>,
    pub args_escaped: bool,
    pub attach_stderr: bool,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub open_stdin: bool,
    pub stdin_once: bool,
    pub tty: bool,
    pub network_disabled: bool,
    pub mac_address: String,
    pub stop_signal: String,
    pub stop_timeout: Option<i64>,
    pub shell: Option<Vec<String>>,
}

/// Health-check probe definition from an image configuration.
///
/// Durations are in nanoseconds, matching engine wire values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthConfig {
    pub test: Vec<String>,
    pub interval: i64,
    pub timeout: i64,
    pub start_period: i64,
    pub start_interval: i64,
    pub retries: i64,
}

/// One layer of an image's build history.
///
/// Adapters preserve the order the engine reports; entries are never
/// re-sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageHistory {
    pub id: String,
    pub created: i64,
    /// Command that produced the layer.
    pub created_by: String,
    pub tags: Vec<String>,
    pub size: i64,
    pub comment: String,
}

/// Opaque registry credential handle.
///
/// Tagged with the engine kind that minted it; an adapter refuses a
/// handle minted for another engine. Callers obtain one through
/// `registry_auth_config` and pass it back to `pull_image` unchanged.
#[derive(Clone)]
pub struct AuthConfig {
    pub(crate) runtime_type: RuntimeType,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) server_address: Option<String>,
    pub(crate) identity_token: Option<String>,
}

impl AuthConfig {
    pub(crate) fn basic(
        runtime_type: RuntimeType,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            runtime_type,
            username: username.into(),
            password: password.into(),
            server_address: None,
            identity_token: None,
        }
    }

    /// The engine kind this credential was minted for.
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("runtime_type", &self.runtime_type)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .field(
                "identity_token",
                &self.identity_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Options for pulling an image.
pub struct PullImageOptions {
    pub repository: String,
    pub tag: String,
    /// Optional sink for streamed progress; receives one JSON line per
    /// engine progress event. Backpressure and lifecycle belong to the
    /// caller.
    pub output: Option<Box<dyn Write + Send>>,
}

impl PullImageOptions {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            output: None,
        }
    }

    /// Build pull options from a parsed image reference.
    pub fn from_ref(reference: &ImageRef) -> Self {
        Self::new(reference.repository(), reference.tag().unwrap_or_default())
    }

    pub fn with_output(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.output = Some(sink);
        self
    }
}

impl fmt::Debug for PullImageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullImageOptions")
            .field("repository", &self.repository)
            .field("tag", &self.tag)
            .field("output", &self.output.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

/// Strip the digest algorithm prefix from an image ID.
pub fn clean_image_id(id: &str) -> &str {
    id.strip_prefix("sha256:").unwrap_or(id)
}

/// Shorten an image ID to the conventional 12-character prefix.
///
/// Inputs shorter than the prefix length are returned whole.
pub fn short_image_id(id: &str) -> &str {
    let cleaned = clean_image_id(id);
    cleaned.get(..12).unwrap_or(cleaned)
}
