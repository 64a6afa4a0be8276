//! Lifecycle orchestration: create/list/get/add-source/sync-source/destroy,
//! with on-disk metadata at `<home>/environments/<shadow_id>/`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use shadow_env::ShadowEnvironment;
use shadow_forge::ForgeClient;
use shadow_rewrite::RewriteInstaller;
use shadow_runtime::{Mount, ResourceLimits, RuntimeAdapter};
use shadow_spec::RepoSpec;

use crate::error::{Error, Result};
use crate::metadata::{Metadata, ShadowStatus, SourceMeta};
use crate::preflight;
use crate::shadow::Shadow;

/// Public forge host rewrite rules target. A single fixed value keeps the
/// engine's contract simple; the original-source mapping of local sources is
/// always to GitHub-shaped URLs.
const PUBLIC_FORGE_HOST: &str = "github.com";

const FORGE_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Options accepted by [`ShadowManager::create`].
#[derive(Debug, Default, Clone)]
pub struct CreateOptions {
    pub name: Option<String>,
    pub image: Option<String>,
    pub env: Vec<(String, String)>,
    pub verify: bool,
}

/// Owns the on-disk environment store and an in-process cache of live
/// shadows.
pub struct ShadowManager {
    home: PathBuf,
    cache: Mutex<HashMap<String, Arc<Shadow>>>,
}

impl ShadowManager {
    pub fn new() -> Self {
        Self::with_home(default_home())
    }

    pub fn with_home(home: PathBuf) -> Self {
        Self {
            home,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn environments_dir(&self) -> PathBuf {
        self.home.join("environments")
    }

    fn shadow_dir(&self, id: &str) -> PathBuf {
        self.environments_dir().join(id)
    }

    /// Ordered, all-or-nothing: parse specs, snapshot, ensure image, start
    /// the container, provision the forge, install rewrite rules, persist
    /// metadata. Any failure from step 6 onward rolls back the container and
    /// host directory.
    pub async fn create(&self, local_sources: &[String], opts: CreateOptions) -> Result<Arc<Shadow>> {
        // Step 1: derive id/container name, reject collisions.
        let id = opts.name.clone().unwrap_or_else(|| format!("shadow-{}", short_token()));
        let container_name = format!("shadow-{id}");
        let shadow_dir = self.shadow_dir(&id);

        if shadow_dir.exists() {
            return Err(Error::AlreadyExists {
                message: format!("shadow directory already exists: {}", shadow_dir.display()),
            });
        }

        let backend = shadow_runtime::detect_backend().ok_or(Error::ContainerRuntimeUnavailable)?;
        let adapter = RuntimeAdapter::new(backend);
        if adapter.exists(&container_name).await? {
            return Err(Error::AlreadyExists {
                message: format!("container already exists: {container_name}"),
            });
        }

        // Step 2: host directory tree.
        let workspace_dir = shadow_dir.join("workspace");
        let snapshots_dir = shadow_dir.join("snapshots");
        std::fs::create_dir_all(&workspace_dir)?;
        std::fs::create_dir_all(&snapshots_dir)?;

        // Step 3: parse + snapshot each local source.
        let mut specs = Vec::with_capacity(local_sources.len());
        for mapping in local_sources {
            let spec = RepoSpec::parse_local(mapping)?;
            specs.push(spec);
        }
        let snapshot_engine = shadow_snapshot::SnapshotEngine::new(snapshots_dir.clone());
        for spec in &mut specs {
            if let Some(local_path) = spec.local_path.clone() {
                let result = snapshot_engine.snapshot(&local_path, &spec.org, &spec.name)?;
                spec.snapshot_commit = Some(result.commit_sha);
            }
        }

        // Step 4: ensure image.
        let image_tag = opts
            .image
            .clone()
            .unwrap_or_else(|| shadow_image::DEFAULT_IMAGE_NAME.to_string());
        let builder = shadow_image::ImageBuilder::new(backend);
        if let Err(e) = builder.ensure_image(&image_tag, |line| tracing::debug!(line, "image build")).await {
            let _ = std::fs::remove_dir_all(&shadow_dir);
            return Err(e.into());
        }

        // Step 5: start the container.
        let mounts = vec![
            Mount {
                host_path: snapshots_dir.clone(),
                container_path: "/snapshots".to_string(),
                readonly: true,
            },
            Mount {
                host_path: workspace_dir.clone(),
                container_path: "/workspace".to_string(),
                readonly: false,
            },
        ];
        let mut env_vars = auto_passthrough_env();
        env_vars.extend(opts.env.iter().cloned());
        let env_var_names: Vec<String> = env_vars.iter().map(|(k, _)| k.clone()).collect();

        if let Err(e) = adapter
            .run(&image_tag, &container_name, &mounts, &env_vars, &ResourceLimits::default())
            .await
        {
            let _ = std::fs::remove_dir_all(&shadow_dir);
            return Err(e.into());
        }

        // Steps 6-8: forge provisioning, rewrite rules, metadata. Any
        // failure here force-removes the container and deletes the host
        // directory before surfacing the error.
        match self
            .finish_create(&adapter, &container_name, &specs, opts.verify)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                let _ = adapter.remove(&container_name, true).await;
                let _ = std::fs::remove_dir_all(&shadow_dir);
                return Err(e);
            }
        }

        let metadata = Metadata {
            id: id.clone(),
            container_name: container_name.clone(),
            sources: specs
                .iter()
                .map(|s| SourceMeta {
                    repo: s.full_name(),
                    local_path: s.local_path.clone(),
                    snapshot_commit: s.snapshot_commit.clone(),
                })
                .collect(),
            created_at: Utc::now(),
            image: image_tag.clone(),
            env_vars_passed: env_var_names.clone(),
            extra: Default::default(),
        };
        metadata.save(&shadow_dir.join("metadata.json"))?;

        let env = ShadowEnvironment::new(adapter, container_name.clone(), workspace_dir);
        env.snapshot_baseline()?;

        let shadow = Arc::new(Shadow {
            id: id.clone(),
            container_name,
            repos: specs,
            shadow_dir,
            created_at: metadata.created_at,
            status: ShadowStatus::Ready,
            env_vars_passed: env_var_names,
            backend,
            env,
        });

        self.cache.lock().unwrap().insert(id, shadow.clone());
        Ok(shadow)
    }

    async fn finish_create(
        &self,
        adapter: &RuntimeAdapter,
        container_name: &str,
        specs: &[RepoSpec],
        verify: bool,
    ) -> Result<()> {
        let forge = ForgeClient::new(adapter, container_name.to_string());
        forge.wait_ready(FORGE_READY_TIMEOUT).await?;

        for spec in specs {
            let bundle_path = format!("/snapshots/{}/{}.bundle", spec.org, spec.name);
            forge.setup_repo_from_bundle(&bundle_path, &spec.org, &spec.name).await?;
        }

        let installer = RewriteInstaller::new(adapter, container_name.to_string(), PUBLIC_FORGE_HOST);
        installer.install(specs).await?;
        installer.verify(specs).await?;

        if verify {
            // The smoke test needs a full `Shadow` handle; run_smoke_test only
            // touches `backend`, `container_name`, and `repos`, so a
            // throwaway value covers it without duplicating the logic here.
            let probe = Shadow {
                id: String::new(),
                container_name: container_name.to_string(),
                repos: specs.to_vec(),
                shadow_dir: PathBuf::new(),
                created_at: Utc::now(),
                status: ShadowStatus::Ready,
                env_vars_passed: Vec::new(),
                backend: adapter.backend(),
                env: ShadowEnvironment::new(adapter.clone(), container_name.to_string(), PathBuf::new()),
            };
            let result = preflight::run_smoke_test(&probe).await?;
            if !matches!(result.status, preflight::SmokeStatus::Passed) {
                return Err(Error::VerificationFailed {
                    message: result.evidence.unwrap_or_default(),
                });
            }
        }

        Ok(())
    }

    /// Add sources to an existing shadow. Fails if a spec is already
    /// present.
    pub async fn add_source(&self, id: &str, mapping: &str) -> Result<Arc<Shadow>> {
        self.mutate_sources(id, mapping, false).await
    }

    /// Idempotent: adds a new spec, or re-snapshots and re-pushes an
    /// existing one (force push), then clears container-side dependency
    /// caches.
    pub async fn sync_source(&self, id: &str, mapping: &str) -> Result<Arc<Shadow>> {
        self.mutate_sources(id, mapping, true).await
    }

    async fn mutate_sources(&self, id: &str, mapping: &str, allow_existing: bool) -> Result<Arc<Shadow>> {
        let shadow = self.get(id).await?.ok_or_else(|| Error::NotFound {
            message: format!("no such shadow: {id}"),
        })?;

        let mut spec = RepoSpec::parse_local(mapping)?;
        let already_present = shadow.repos.iter().any(|r| r.full_name() == spec.full_name());
        if already_present && !allow_existing {
            return Err(Error::AlreadyExists {
                message: format!("source already present: {}", spec.full_name()),
            });
        }

        let snapshots_dir = shadow.shadow_dir.join("snapshots");
        let engine = shadow_snapshot::SnapshotEngine::new(snapshots_dir.clone());
        let local_path = spec.local_path.clone().expect("parse_local always sets local_path");
        let snapshot = engine.snapshot(&local_path, &spec.org, &spec.name)?;
        spec.snapshot_commit = Some(snapshot.commit_sha);

        let adapter = RuntimeAdapter::new(shadow.backend);
        let forge = ForgeClient::new(&adapter, shadow.container_name.clone());
        let bundle_path = format!("/snapshots/{}/{}.bundle", spec.org, spec.name);
        forge.setup_repo_from_bundle(&bundle_path, &spec.org, &spec.name).await?;

        let installer = RewriteInstaller::new(&adapter, shadow.container_name.clone(), PUBLIC_FORGE_HOST);
        let mut repos = shadow.repos.clone();
        if let Some(existing) = repos.iter_mut().find(|r| r.full_name() == spec.full_name()) {
            *existing = spec;
        } else {
            repos.push(spec);
        }
        installer.install(&repos).await?;
        installer.verify(&repos).await?;

        let metadata_path = shadow.shadow_dir.join("metadata.json");
        let mut metadata = Metadata::load(&metadata_path)?;
        metadata.sources = repos
            .iter()
            .map(|s| SourceMeta {
                repo: s.full_name(),
                local_path: s.local_path.clone(),
                snapshot_commit: s.snapshot_commit.clone(),
            })
            .collect();
        metadata.save(&metadata_path)?;

        let updated = Arc::new(Shadow {
            id: shadow.id.clone(),
            container_name: shadow.container_name.clone(),
            repos,
            shadow_dir: shadow.shadow_dir.clone(),
            created_at: shadow.created_at,
            status: shadow.status,
            env_vars_passed: shadow.env_vars_passed.clone(),
            backend: shadow.backend,
            env: ShadowEnvironment::new(adapter, shadow.container_name.clone(), shadow.shadow_dir.join("workspace")),
        });
        updated.env.snapshot_baseline()?;
        self.cache.lock().unwrap().insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    /// In-memory hit, else reconstruct from `metadata.json`.
    pub async fn get(&self, id: &str) -> Result<Option<Arc<Shadow>>> {
        if let Some(shadow) = self.cache.lock().unwrap().get(id).cloned() {
            return Ok(Some(shadow));
        }

        let shadow_dir = self.shadow_dir(id);
        let metadata_path = shadow_dir.join("metadata.json");
        if !metadata_path.exists() {
            return Ok(None);
        }
        let metadata = Metadata::load(&metadata_path)?;

        let backend = shadow_runtime::detect_backend().ok_or(Error::ContainerRuntimeUnavailable)?;
        let adapter = RuntimeAdapter::new(backend);
        let repos = metadata
            .sources
            .iter()
            .map(|s| {
                let mut spec = RepoSpec::parse(&s.repo)?;
                spec.local_path = s.local_path.clone();
                spec.snapshot_commit = s.snapshot_commit.clone();
                Ok(spec)
            })
            .collect::<Result<Vec<_>>>()?;

        let env = ShadowEnvironment::new(adapter, metadata.container_name.clone(), shadow_dir.join("workspace"));
        let shadow = Arc::new(Shadow {
            id: metadata.id.clone(),
            container_name: metadata.container_name.clone(),
            repos,
            shadow_dir,
            created_at: metadata.created_at,
            status: ShadowStatus::Ready,
            env_vars_passed: metadata.env_vars_passed.clone(),
            backend,
            env,
        });

        self.cache.lock().unwrap().insert(id.to_string(), shadow.clone());
        Ok(Some(shadow))
    }

    /// List every shadow recorded on disk.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.environments_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(ids)
    }

    /// Force-remove the container, evict from cache, delete the host
    /// directory. Idempotent: a missing container or directory is not an
    /// error.
    pub async fn destroy(&self, id: &str, force: bool) -> Result<()> {
        self.cache.lock().unwrap().remove(id);

        if let Some(backend) = shadow_runtime::detect_backend() {
            let adapter = RuntimeAdapter::new(backend);
            let container_name = format!("shadow-{id}");
            if let Err(e) = adapter.remove(&container_name, true).await {
                if !force {
                    return Err(e.into());
                }
                tracing::debug!(id, error = %e, "destroy: container removal failed, continuing under force");
            }
        }

        let shadow_dir = self.shadow_dir(id);
        if shadow_dir.exists() {
            std::fs::remove_dir_all(&shadow_dir)?;
        }
        Ok(())
    }

    /// Iterate and tolerate individual failures when `force`.
    pub async fn destroy_all(&self, force: bool) -> Result<()> {
        for id in self.list()? {
            if let Err(e) = self.destroy(&id, force).await {
                if !force {
                    return Err(e);
                }
                tracing::warn!(id, error = %e, "destroy_all: continuing under force");
            }
        }
        Ok(())
    }
}

impl Default for ShadowManager {
    fn default() -> Self {
        Self::new()
    }
}

fn default_home() -> PathBuf {
    std::env::var_os("SHADOW_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".shadow")))
        .unwrap_or_else(|| PathBuf::from(".shadow"))
}

fn short_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Fixed, documented list of API-key variable *names* auto-copied from the
/// caller's environment into the container if present. Values are never
/// persisted; only the names that were found are recorded in metadata.
pub const AUTO_PASSTHROUGH_ENV_VARS: &[&str] = &[
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "NPM_TOKEN",
    "CARGO_REGISTRY_TOKEN",
];

fn auto_passthrough_env() -> Vec<(String, String)> {
    AUTO_PASSTHROUGH_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_runtime::ContainerBackend;

    fn fake_shadow(id: &str, repos: Vec<RepoSpec>, shadow_dir: PathBuf) -> Shadow {
        let container_name = format!("shadow-{id}");
        let adapter = RuntimeAdapter::new(ContainerBackend::Podman);
        Shadow {
            id: id.to_string(),
            container_name: container_name.clone(),
            repos,
            shadow_dir: shadow_dir.clone(),
            created_at: Utc::now(),
            status: ShadowStatus::Ready,
            env_vars_passed: Vec::new(),
            backend: ContainerBackend::Podman,
            env: ShadowEnvironment::new(adapter, container_name, shadow_dir.join("workspace")),
        }
    }

    #[tokio::test]
    async fn list_is_empty_without_environments_dir() {
        let home = tempfile::tempdir().unwrap();
        let manager = ShadowManager::with_home(home.path().to_path_buf());
        assert_eq!(manager.list().unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn destroy_missing_shadow_is_idempotent() {
        let home = tempfile::tempdir().unwrap();
        let manager = ShadowManager::with_home(home.path().to_path_buf());
        manager.destroy("no-such-shadow", false).await.unwrap();
    }

    #[tokio::test]
    async fn get_returns_none_when_metadata_missing() {
        let home = tempfile::tempdir().unwrap();
        let manager = ShadowManager::with_home(home.path().to_path_buf());
        assert!(manager.get("no-such-shadow").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_source_rejects_repo_already_present() {
        let home = tempfile::tempdir().unwrap();
        let manager = ShadowManager::with_home(home.path().to_path_buf());

        let local = tempfile::tempdir().unwrap();
        std::fs::create_dir(local.path().join(".git")).unwrap();

        let spec = RepoSpec::parse("acme/widgets").unwrap();
        let shadow_dir = home.path().join("environments").join("shadow-1");
        let shadow = fake_shadow("shadow-1", vec![spec], shadow_dir);
        manager.cache.lock().unwrap().insert(shadow.id.clone(), Arc::new(shadow));

        let mapping = format!("{}:acme/widgets", local.path().display());
        let result = manager.add_source("shadow-1", &mapping).await;
        assert!(matches!(result, Err(Error::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn add_source_fails_for_unknown_shadow() {
        let home = tempfile::tempdir().unwrap();
        let manager = ShadowManager::with_home(home.path().to_path_buf());

        let local = tempfile::tempdir().unwrap();
        std::fs::create_dir(local.path().join(".git")).unwrap();
        let mapping = format!("{}:acme/widgets", local.path().display());

        let result = manager.add_source("no-such-shadow", &mapping).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn auto_passthrough_env_only_includes_present_vars() {
        std::env::remove_var("CARGO_REGISTRY_TOKEN");
        std::env::set_var("GITHUB_TOKEN", "test-token");
        let found = auto_passthrough_env();
        std::env::remove_var("GITHUB_TOKEN");

        assert!(found.iter().any(|(k, v)| k == "GITHUB_TOKEN" && v == "test-token"));
        assert!(!found.iter().any(|(k, _)| k == "CARGO_REGISTRY_TOKEN"));
    }

    #[test]
    fn short_token_is_six_hex_chars() {
        let token = short_token();
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
