// ABOUTME: Bollard-based engine adapter for Docker and Podman.
// ABOUTME: Translates SDK responses and errors into the neutral image model.

use super::archive;
use super::credentials::{FsCredentialStore, resolve_registry_auth};
use super::traits::sealed::Sealed;
use super::traits::{
    AuthConfig, BasicImageInfo, HealthConfig, ImageError, ImageHistory, ImageIdentity, ImageInfo,
    ImageRuntime, PullImageOptions, RunConfig, short_image_id,
};
use super::types::{RuntimeHandle, RuntimeType};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{HistoryResponseItem, ImageConfig, ImageInspect, ImageSummary};
use bollard::query_parameters::{CreateImageOptions, ListImagesOptions};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_not_found(e: bollard::errors::Error, context: &str, image_ref: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_ref.to_string())
        }
        _ => ImageError::provider(format!("{} {}", context, image_ref), e),
    }
}

/// A credential handle is only usable by the engine that minted it.
fn check_auth_affinity(
    runtime_type: RuntimeType,
    auth: Option<&AuthConfig>,
) -> Result<(), ImageError> {
    match auth {
        Some(auth) if auth.runtime_type() != runtime_type => Err(ImageError::BadParam(format!(
            "auth config was issued for the {} runtime, not {}",
            auth.runtime_type(),
            runtime_type
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// Translation Helpers
// =============================================================================

fn created_epoch(created: Option<&str>) -> i64 {
    created
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or_default()
}

fn basic_image_info(summary: ImageSummary) -> BasicImageInfo {
    BasicImageInfo {
        id: summary.id,
        size: summary.size,
        created: summary.created,
        // VirtualSize is gone from engine APIs >= 1.44.
        virtual_size: None,
        parent_id: summary.parent_id,
        repo_tags: summary.repo_tags,
        repo_digests: summary.repo_digests,
        labels: summary.labels,
    }
}

/// Key listings by de-duplicated `repo:tag` name; untagged images carry
/// no usable name and are skipped.
fn image_map(summaries: Vec<ImageSummary>) -> HashMap<String, BasicImageInfo> {
    let mut images = HashMap::new();
    for summary in summaries {
        let info = basic_image_info(summary);
        for repo_tag in &info.repo_tags {
            if repo_tag == "<none>:<none>" {
                continue;
            }
            images.insert(repo_tag.clone(), info.clone());
        }
    }
    images
}

fn image_identity(image_ref: &str, inspect: &ImageInspect) -> Result<ImageIdentity, ImageError> {
    let id = inspect.id.clone().unwrap_or_default();
    if id.is_empty() {
        return Err(ImageError::provider(
            format!("checking image {}", image_ref),
            "engine returned an image without an ID",
        ));
    }

    let repo_tags = inspect.repo_tags.clone().unwrap_or_default();
    let short_tags = repo_tags
        .iter()
        .filter_map(|repo_tag| match repo_tag.rsplit_once(':') {
            Some((_, tag)) if !tag.contains('/') => Some(tag.to_string()),
            _ => None,
        })
        .collect();

    let repo_digests = inspect.repo_digests.clone().unwrap_or_default();
    let short_digests = repo_digests
        .iter()
        .map(|repo_digest| {
            let digest = repo_digest
                .split_once('@')
                .map_or(repo_digest.as_str(), |(_, digest)| digest);
            short_image_id(digest).to_string()
        })
        .collect();

    Ok(ImageIdentity {
        id,
        short_tags,
        repo_tags,
        short_digests,
        repo_digests,
    })
}

fn health_config(hc: bollard::models::HealthConfig) -> HealthConfig {
    HealthConfig {
        test: hc.test.unwrap_or_default(),
        interval: hc.interval.unwrap_or_default(),
        timeout: hc.timeout.unwrap_or_default(),
        start_period: hc.start_period.unwrap_or_default(),
        start_interval: hc.start_interval.unwrap_or_default(),
        retries: hc.retries.unwrap_or_default(),
    }
}

fn run_config(config: ImageConfig) -> RunConfig {
    RunConfig {
        user: config.user.unwrap_or_default(),
        env: config.env.unwrap_or_default(),
        entrypoint: config.entrypoint,
        cmd: config.cmd,
        exposed_ports: config
            .exposed_ports
            .map(|ports| ports.into_keys().collect()),
        volumes: config.volumes.map(|volumes| volumes.into_keys().collect()),
        working_dir: config.working_dir.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        healthcheck: config.healthcheck.map(health_config),
        hostname: config.hostname.unwrap_or_default(),
        domainname: config.domainname.unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        on_build: config.on_build.unwrap_or_default(),
        args_escaped: config.args_escaped.unwrap_or_default(),
        attach_stderr: config.attach_stderr.unwrap_or_default(),
        attach_stdin: config.attach_stdin.unwrap_or_default(),
        attach_stdout: config.attach_stdout.unwrap_or_default(),
        open_stdin: config.open_stdin.unwrap_or_default(),
        stdin_once: config.stdin_once.unwrap_or_default(),
        tty: config.tty.unwrap_or_default(),
        network_disabled: config.network_disabled.unwrap_or_default(),
        mac_address: config.mac_address.unwrap_or_default(),
        stop_signal: config.stop_signal.unwrap_or_default(),
        stop_timeout: config.stop_timeout,
        shell: config.shell,
    }
}

fn image_info(runtime_type: RuntimeType, inspect: ImageInspect) -> ImageInfo {
    ImageInfo {
        runtime_name: runtime_type.to_string(),
        runtime_version: inspect.docker_version.unwrap_or_default(),
        id: inspect.id.unwrap_or_default(),
        size: inspect.size.unwrap_or_default(),
        created: created_epoch(inspect.created.as_deref()),
        virtual_size: None,
        repo_tags: inspect.repo_tags.unwrap_or_default(),
        repo_digests: inspect.repo_digests.unwrap_or_default(),
        os: inspect.os.unwrap_or_default(),
        architecture: inspect.architecture.unwrap_or_default(),
        author: inspect.author.unwrap_or_default(),
        // Only materialize the block the engine actually reported.
        config: inspect.config.map(run_config),
    }
}

fn history_entry(item: HistoryResponseItem) -> ImageHistory {
    ImageHistory {
        id: item.id,
        created: item.created,
        created_by: item.created_by,
        tags: item.tags,
        size: item.size,
        comment: item.comment,
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Engine adapter backed by the bollard SDK.
///
/// Serves both Docker and Podman through the Docker-compatible API; the
/// `runtime_type` records which engine sits behind the socket and tags
/// the credentials this adapter mints.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Wrap an existing bollard client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the engine socket named by a [`RuntimeHandle`].
    pub fn connect(handle: &RuntimeHandle) -> Result<Self, ImageError> {
        let client =
            Docker::connect_with_unix(&handle.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ImageError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, handle.runtime_type))
    }

    /// The engine kind this adapter speaks to.
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl ImageRuntime for BollardRuntime {
    async fn has_image(&self, image_ref: &str) -> Result<ImageIdentity, ImageError> {
        debug!(image_ref, "checking image existence");

        let inspect = self
            .client
            .inspect_image(image_ref)
            .await
            .map_err(|e| map_not_found(e, "checking image", image_ref))?;

        image_identity(image_ref, &inspect)
    }

    async fn list_images_all(&self) -> Result<Vec<BasicImageInfo>, ImageError> {
        let opts = ListImagesOptions {
            all: true,
            ..Default::default()
        };

        let summaries = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::provider("listing all images", e))?;

        Ok(summaries.into_iter().map(basic_image_info).collect())
    }

    async fn list_images(
        &self,
        name_filter: &str,
    ) -> Result<HashMap<String, BasicImageInfo>, ImageError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if !name_filter.is_empty() {
            filters.insert("reference".to_string(), vec![name_filter.to_string()]);
        }

        let opts = ListImagesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        let summaries = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::provider("listing images", e))?;

        Ok(image_map(summaries))
    }

    async fn inspect_image(&self, image_ref: &str) -> Result<ImageInfo, ImageError> {
        debug!(image_ref, "inspecting image");

        let inspect = self
            .client
            .inspect_image(image_ref)
            .await
            .map_err(|e| map_not_found(e, "inspecting image", image_ref))?;

        Ok(image_info(self.runtime_type, inspect))
    }

    async fn pull_image(
        &self,
        mut opts: PullImageOptions,
        auth: Option<&AuthConfig>,
    ) -> Result<(), ImageError> {
        check_auth_affinity(self.runtime_type, auth)?;

        let image_name = if opts.tag.is_empty() {
            opts.repository.clone()
        } else {
            format!("{}:{}", opts.repository, opts.tag)
        };
        debug!(image = %image_name, "pulling image");

        let create_opts = CreateImageOptions {
            from_image: Some(opts.repository.clone()),
            tag: if opts.tag.is_empty() {
                None
            } else {
                Some(opts.tag.clone())
            },
            ..Default::default()
        };

        let credentials = auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server_address.clone(),
            identitytoken: a.identity_token.clone(),
            ..Default::default()
        });

        // Pull returns a stream of progress events; consume it fully and
        // mirror each event into the caller's sink as a JSON line.
        let mut stream = self.client.create_image(Some(create_opts), None, credentials);
        while let Some(result) = stream.next().await {
            let progress = result
                .map_err(|e| ImageError::provider(format!("pulling image {}", image_name), e))?;

            if let Some(out) = opts.output.as_mut() {
                serde_json::to_writer(&mut *out, &progress)
                    .map_err(|e| ImageError::provider("writing pull progress", e))?;
                out.write_all(b"\n")
                    .map_err(|e| ImageError::provider("writing pull progress", e))?;
            }
        }

        Ok(())
    }

    async fn registry_auth_config(
        &self,
        account: &str,
        secret: &str,
        config_path: &str,
        registry: &str,
    ) -> Result<AuthConfig, ImageError> {
        let store = FsCredentialStore::default();
        resolve_registry_auth(
            self.runtime_type,
            &store,
            account,
            secret,
            config_path,
            registry,
        )
    }

    async fn save_image(
        &self,
        image_ref: &str,
        local_path: &Path,
        extract: bool,
        remove_orig: bool,
    ) -> Result<(), ImageError> {
        if image_ref.is_empty() {
            return Err(ImageError::BadParam("image reference is empty".to_string()));
        }
        if local_path.as_os_str().is_empty() {
            return Err(ImageError::BadParam("local path is empty".to_string()));
        }
        debug!(image_ref, path = %local_path.display(), "saving image");

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| {
                ImageError::provider(format!("creating {}", local_path.display()), e)
            })?;

        let mut stream = self.client.export_image(image_ref);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    file.write_all(&bytes).await.map_err(|e| {
                        ImageError::provider(format!("writing {}", local_path.display()), e)
                    })?;
                }
                Err(e) => {
                    // Partial archives are useless; discard before failing.
                    drop(file);
                    let _ = tokio::fs::remove_file(local_path).await;
                    return Err(map_not_found(e, "saving image", image_ref));
                }
            }
        }
        file.flush()
            .await
            .map_err(|e| ImageError::provider(format!("writing {}", local_path.display()), e))?;
        drop(file);

        archive::finish_save(local_path, extract, remove_orig)
    }

    async fn image_history(&self, image_ref: &str) -> Result<Vec<ImageHistory>, ImageError> {
        let history = self
            .client
            .image_history(image_ref)
            .await
            .map_err(|e| map_not_found(e, "fetching history of", image_ref))?;

        // Engine order is preserved, never re-sorted.
        Ok(history.into_iter().map(history_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:deadbeefcafebabe0123456789abcdef0123456789abcdef0123456789abcdef";

    fn summary(repo_tags: &[&str]) -> ImageSummary {
        ImageSummary {
            id: DIGEST.to_string(),
            repo_tags: repo_tags.iter().map(|t| t.to_string()).collect(),
            size: 1_048_576,
            created: 1_700_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn list_mapping_keys_by_repo_tag() {
        let images = image_map(vec![summary(&["app:latest"])]);

        let info = images.get("app:latest").expect("key should be repo:tag");
        assert_eq!(info.id, DIGEST);
        assert_eq!(info.size, 1_048_576);
        assert_eq!(info.created, 1_700_000_000);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn list_mapping_skips_untagged_and_dedupes() {
        let images = image_map(vec![
            summary(&["<none>:<none>"]),
            summary(&["app:latest", "app:1.0"]),
            summary(&["app:latest"]),
        ]);

        assert_eq!(images.len(), 2);
        assert!(images.contains_key("app:latest"));
        assert!(images.contains_key("app:1.0"));
    }

    fn inspect_with_config() -> ImageInspect {
        ImageInspect {
            id: Some(DIGEST.to_string()),
            repo_tags: Some(vec!["app:latest".to_string()]),
            repo_digests: Some(vec![format!("app@{}", DIGEST)]),
            size: Some(1_048_576),
            created: Some("2023-11-14T22:13:20Z".to_string()),
            docker_version: Some("24.0.7".to_string()),
            os: Some("linux".to_string()),
            architecture: Some("amd64".to_string()),
            author: Some("someone".to_string()),
            config: Some(ImageConfig {
                env: Some(vec!["PATH=/usr/bin".to_string(), "MODE=prod".to_string()]),
                healthcheck: Some(bollard::models::HealthConfig {
                    test: Some(vec!["CMD".to_string(), "true".to_string()]),
                    retries: Some(3),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn inspect_translation_preserves_documented_fields() {
        let info = image_info(RuntimeType::Docker, inspect_with_config());

        assert_eq!(info.runtime_name, "docker");
        assert_eq!(info.runtime_version, "24.0.7");
        assert_eq!(info.id, DIGEST);
        assert_eq!(info.size, 1_048_576);
        assert_eq!(info.created, 1_700_000_000);
        assert_eq!(info.repo_tags, vec!["app:latest".to_string()]);

        let config = info.config.expect("config block was present");
        assert_eq!(
            config.env,
            vec!["PATH=/usr/bin".to_string(), "MODE=prod".to_string()]
        );
        let healthcheck = config.healthcheck.expect("healthcheck was present");
        assert_eq!(healthcheck.retries, 3);
    }

    #[test]
    fn absent_config_block_stays_absent() {
        let inspect = ImageInspect {
            id: Some(DIGEST.to_string()),
            config: None,
            ..Default::default()
        };

        let info = image_info(RuntimeType::Podman, inspect);
        assert_eq!(info.runtime_name, "podman");
        assert!(info.config.is_none());
    }

    #[test]
    fn identity_derives_short_tags_and_digests() {
        let identity = image_identity("app", &inspect_with_config()).unwrap();

        assert_eq!(identity.id, DIGEST);
        assert_eq!(identity.short_tags, vec!["latest".to_string()]);
        assert_eq!(identity.short_digests, vec!["deadbeefcafe".to_string()]);
    }

    #[test]
    fn identity_guards_short_digest_truncation() {
        let inspect = ImageInspect {
            id: Some("sha256:ab".to_string()),
            repo_digests: Some(vec!["app@sha256:ab".to_string()]),
            ..Default::default()
        };

        let identity = image_identity("app", &inspect).unwrap();
        assert_eq!(identity.short_digests, vec!["ab".to_string()]);
    }

    #[test]
    fn identity_requires_an_id() {
        let inspect = ImageInspect::default();
        assert!(image_identity("app", &inspect).is_err());
    }

    #[test]
    fn engine_404_maps_to_not_found() {
        let e = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such image".to_string(),
        };
        assert!(matches!(
            map_not_found(e, "checking image", "app"),
            ImageError::NotFound(image_ref) if image_ref == "app"
        ));
    }

    #[test]
    fn other_engine_errors_are_wrapped_with_context() {
        let e = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        match map_not_found(e, "inspecting image", "app") {
            ImageError::Provider { context, message } => {
                assert_eq!(context, "inspecting image app");
                assert!(message.contains("boom"));
            }
            other => panic!("expected Provider, got {:?}", other),
        }
    }

    #[test]
    fn foreign_auth_handle_is_a_bad_param() {
        let auth = AuthConfig::basic(RuntimeType::Podman, "user", "pass");
        let err = check_auth_affinity(RuntimeType::Docker, Some(&auth)).unwrap_err();
        assert!(matches!(err, ImageError::BadParam(_)));

        assert!(check_auth_affinity(RuntimeType::Docker, None).is_ok());
        let native = AuthConfig::basic(RuntimeType::Docker, "user", "pass");
        assert!(check_auth_affinity(RuntimeType::Docker, Some(&native)).is_ok());
    }

    #[test]
    fn history_order_is_preserved() {
        let items = vec![
            HistoryResponseItem {
                id: "layer-a".to_string(),
                created: 1,
                created_by: "ADD file".to_string(),
                tags: vec![],
                size: 10,
                comment: String::new(),
            },
            HistoryResponseItem {
                id: "layer-b".to_string(),
                created: 2,
                created_by: "RUN build".to_string(),
                tags: vec!["app:latest".to_string()],
                size: 20,
                comment: "final".to_string(),
            },
        ];

        let history: Vec<_> = items.into_iter().map(history_entry).collect();
        assert_eq!(history[0].id, "layer-a");
        assert_eq!(history[1].id, "layer-b");
        assert_eq!(history[1].created_by, "RUN build");
    }

    #[tokio::test]
    async fn save_image_rejects_empty_parameters() {
        let handle = RuntimeHandle {
            runtime_type: RuntimeType::Docker,
            socket_path: "/tmp/gantry-test-nonexistent.sock".to_string(),
        };
        let runtime = BollardRuntime::connect(&handle).unwrap();

        let err = runtime
            .save_image("", Path::new("/tmp/x.tar"), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::BadParam(_)));

        let err = runtime
            .save_image("app", Path::new(""), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::BadParam(_)));
    }

    #[test]
    fn created_epoch_parses_rfc3339_and_tolerates_absence() {
        assert_eq!(created_epoch(Some("2023-11-14T22:13:20Z")), 1_700_000_000);
        assert_eq!(
            created_epoch(Some("2023-11-14T22:13:20.123456789Z")),
            1_700_000_000
        );
        assert_eq!(created_epoch(Some("not a date")), 0);
        assert_eq!(created_epoch(None), 0);
    }
}
