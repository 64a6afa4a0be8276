//! The live handle returned to callers: one shadow's metadata plus its
//! [`shadow_env::ShadowEnvironment`].

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shadow_env::{ChangedFile, ExecBatchResult, ShadowEnvironment};
use shadow_runtime::{ContainerBackend, ExecResult};
use shadow_spec::RepoSpec;

use crate::error::Result;
use crate::metadata::ShadowStatus;

/// One live shadow environment, combining the metadata tracked by the
/// manager with the in-process execution handle.
pub struct Shadow {
    pub id: String,
    pub container_name: String,
    pub repos: Vec<RepoSpec>,
    pub shadow_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub status: ShadowStatus,
    pub env_vars_passed: Vec<String>,
    pub backend: ContainerBackend,
    pub(crate) env: ShadowEnvironment,
}

impl Shadow {
    pub async fn exec(&self, command: &[String], timeout: Duration) -> Result<ExecResult> {
        Ok(self.env.exec(command, timeout).await?)
    }

    pub async fn exec_batch(
        &self,
        commands: &[Vec<String>],
        timeout: Duration,
        fail_fast: bool,
    ) -> Result<ExecBatchResult> {
        Ok(self.env.exec_batch(commands, timeout, fail_fast).await?)
    }

    #[cfg(unix)]
    pub fn shell(&self) -> crate::error::Error {
        self.env.shell().into()
    }

    pub fn diff(&self, subtree: Option<&str>) -> Result<Vec<ChangedFile>> {
        Ok(self.env.diff(subtree)?)
    }

    pub fn extract(&self, container_path: &str, host_path: &std::path::Path) -> Result<u64> {
        Ok(self.env.extract(container_path, host_path)?)
    }

    pub fn inject(&self, host_path: &std::path::Path, container_path: &str) -> Result<u64> {
        Ok(self.env.inject(host_path, container_path)?)
    }

    pub async fn is_running(&self) -> Result<bool> {
        Ok(self.env.is_running().await?)
    }

    pub fn to_info(&self) -> crate::metadata::ShadowInfo {
        crate::metadata::ShadowInfo {
            shadow_id: self.id.clone(),
            repos: self.repos.iter().map(RepoSpec::full_name).collect(),
            status: self.status,
            created_at: self.created_at,
            shadow_dir: self.shadow_dir.display().to_string(),
            env_vars_passed: self.env_vars_passed.clone(),
        }
    }
}
