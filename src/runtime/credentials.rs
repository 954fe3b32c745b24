// ABOUTME: Registry credential resolution for engine adapters.
// ABOUTME: Explicit creds, then config file, then helper, then default config.

use super::traits::{AuthConfig, ImageError};
use super::types::RuntimeType;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{trace, warn};

/// Local engine configuration file (`config.json`), read-only.
///
/// Registries are keyed by host under `auths`; `credsStore` and
/// `credHelpers` name external credential helper binaries.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EngineConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default, rename = "credsStore")]
    creds_store: Option<String>,
    #[serde(default, rename = "credHelpers")]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    /// Base64-encoded `user:password` pair.
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    identitytoken: Option<String>,
    #[serde(default)]
    serveraddress: Option<String>,
}

impl EngineConfigFile {
    pub(crate) fn load(path: &Path) -> Result<Self, ImageError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ImageError::provider(format!("loading engine config {}", path.display()), e)
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ImageError::provider(format!("parsing engine config {}", path.display()), e)
        })
    }

    /// Credential for `registry` from the `auths` section, if present.
    pub(crate) fn auth_for(
        &self,
        runtime_type: RuntimeType,
        registry: &str,
    ) -> Result<Option<AuthConfig>, ImageError> {
        let Some(entry) = self.auths.get(registry) else {
            return Ok(None);
        };

        let (username, password) = match (&entry.username, &entry.password) {
            (Some(user), Some(pass)) => (user.clone(), pass.clone()),
            _ => match &entry.auth {
                Some(encoded) => decode_auth_pair(encoded)?,
                None => (String::new(), String::new()),
            },
        };

        Ok(Some(AuthConfig {
            runtime_type,
            username,
            password,
            server_address: Some(
                entry
                    .serveraddress
                    .clone()
                    .unwrap_or_else(|| registry.to_string()),
            ),
            identity_token: entry.identitytoken.clone(),
        }))
    }

    /// Name of the credential helper responsible for `registry`, if any.
    fn helper_for(&self, registry: &str) -> Option<&str> {
        self.cred_helpers
            .get(registry)
            .or(self.creds_store.as_ref())
            .map(String::as_str)
    }
}

fn decode_auth_pair(encoded: &str) -> Result<(String, String), ImageError> {
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| ImageError::provider("decoding auth entry", e))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| ImageError::provider("decoding auth entry", e))?;
    match decoded.split_once(':') {
        Some((user, pass)) => Ok((user.to_string(), pass.to_string())),
        None => Err(ImageError::provider(
            "decoding auth entry",
            "expected user:password pair",
        )),
    }
}

/// A credential returned by a platform helper.
#[derive(Debug, Deserialize)]
pub(crate) struct HelperCredential {
    #[serde(rename = "Username", default)]
    pub(crate) username: String,
    #[serde(rename = "Secret", default)]
    pub(crate) secret: String,
    #[serde(rename = "ServerURL", default)]
    pub(crate) server_url: Option<String>,
}

/// Credential sources consulted by the resolver.
///
/// The filesystem/process implementation is [`FsCredentialStore`]; tests
/// substitute stubs to pin down the fallback chain.
pub(crate) trait CredentialStore {
    /// Load the config file at an explicit path.
    fn load_config(&self, path: &Path) -> Result<EngineConfigFile, ImageError>;

    /// Query the platform credential helper for `registry`.
    ///
    /// `Ok(None)` means no helper is configured or the helper found no
    /// matching credential; errors from a configured helper propagate.
    fn helper_credential(&self, registry: &str)
    -> Result<Option<HelperCredential>, ImageError>;

    /// Load the default local engine config file.
    fn load_default_config(&self) -> Result<EngineConfigFile, ImageError>;
}

/// Filesystem-backed credential store.
#[derive(Debug, Default)]
pub(crate) struct FsCredentialStore {
    /// Overrides the `DOCKER_CONFIG`/home-directory lookup.
    pub(crate) config_dir: Option<PathBuf>,
}

impl FsCredentialStore {
    fn default_config_path(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.config_dir {
            return Some(dir.join("config.json"));
        }
        if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir).join("config.json"));
            }
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }
}

impl CredentialStore for FsCredentialStore {
    fn load_config(&self, path: &Path) -> Result<EngineConfigFile, ImageError> {
        EngineConfigFile::load(path)
    }

    fn helper_credential(
        &self,
        registry: &str,
    ) -> Result<Option<HelperCredential>, ImageError> {
        // The helper name lives in the default config; no config file
        // means no helper.
        let Some(path) = self.default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let config = EngineConfigFile::load(&path)?;
        let Some(helper) = config.helper_for(registry) else {
            return Ok(None);
        };

        run_credential_helper(helper, registry)
    }

    fn load_default_config(&self) -> Result<EngineConfigFile, ImageError> {
        let path = self.default_config_path().ok_or_else(|| {
            ImageError::provider(
                "loading default engine config",
                "cannot determine home directory",
            )
        })?;
        EngineConfigFile::load(&path)
    }
}

/// Exact message a helper prints on stdout when it holds no credential
/// for the requested registry.
const HELPER_MISS_SENTINEL: &str = "credentials not found in native keychain";

/// Speak the credential-helper get-protocol: registry host on stdin,
/// JSON credential on stdout.
fn run_credential_helper(
    helper: &str,
    registry: &str,
) -> Result<Option<HelperCredential>, ImageError> {
    let program = format!("docker-credential-{}", helper);
    let context = format!("credential helper {} for {}", program, registry);

    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ImageError::provider(&context, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(registry.as_bytes())
            .map_err(|e| ImageError::provider(&context, e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ImageError::provider(&context, e))?;

    if !output.status.success() {
        // A clean miss is the sentinel alone on stdout; an error message
        // that merely mentions the phrase must still propagate.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim() == HELPER_MISS_SENTINEL {
            return Ok(None);
        }
        let combined = format!("{}{}", stdout, String::from_utf8_lossy(&output.stderr));
        return Err(ImageError::provider(&context, combined.trim()));
    }

    let credential: HelperCredential = serde_json::from_slice(&output.stdout)
        .map_err(|e| ImageError::provider(&context, e))?;
    if credential.username.is_empty() && credential.secret.is_empty() {
        return Ok(None);
    }
    Ok(Some(credential))
}

/// Resolve registry credentials through the priority-ordered fallback
/// chain.
///
/// 1. Explicit `account`/`secret` - no I/O.
/// 2. Explicit `config_path` - a missing entry is terminal, the chain
///    does not continue past an explicitly named file.
/// 3. Platform credential helper - a helper error is terminal; only a
///    clean "no match" falls through.
/// 4. Default engine config file.
pub(crate) fn resolve_registry_auth(
    runtime_type: RuntimeType,
    store: &dyn CredentialStore,
    account: &str,
    secret: &str,
    config_path: &str,
    registry: &str,
) -> Result<AuthConfig, ImageError> {
    if !account.is_empty() || !secret.is_empty() {
        return Ok(AuthConfig::basic(runtime_type, account, secret));
    }

    if !config_path.is_empty() {
        let config = store.load_config(Path::new(config_path)).map_err(|e| {
            warn!(config_path, registry, error = %e, "failed to load engine config");
            e
        })?;
        return config
            .auth_for(runtime_type, registry)?
            .ok_or_else(|| ImageError::MissingAuthConfig(registry.to_string()));
    }

    match store.helper_credential(registry) {
        Err(e) => {
            warn!(registry, error = %e, "credential helper lookup failed");
            return Err(e);
        }
        Ok(Some(credential)) => {
            trace!(registry, username = %credential.username, "credential helper hit");
            return Ok(from_helper(runtime_type, credential));
        }
        Ok(None) => {}
    }

    let config = store.load_default_config().map_err(|e| {
        warn!(registry, error = %e, "failed to load default engine config");
        e
    })?;
    config
        .auth_for(runtime_type, registry)?
        .ok_or_else(|| ImageError::MissingAuthConfig(registry.to_string()))
}

fn from_helper(runtime_type: RuntimeType, credential: HelperCredential) -> AuthConfig {
    // Helpers report token-based credentials with the "<token>" marker.
    if credential.username == "<token>" {
        AuthConfig {
            runtime_type,
            username: String::new(),
            password: String::new(),
            server_address: credential.server_url,
            identity_token: Some(credential.secret),
        }
    } else {
        AuthConfig {
            runtime_type,
            username: credential.username,
            password: credential.secret,
            server_address: credential.server_url,
            identity_token: None,
        }
    }
}
