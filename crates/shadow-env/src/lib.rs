//! In-process handle to one live shadow: exec, diff, extract, inject.
//!
//! `/workspace` inside the container is a bind mount of a host directory, so
//! [`ShadowEnvironment::extract`]/[`ShadowEnvironment::inject`] operate
//! directly on that host directory rather than shelling a copy command into
//! the container.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shadow_runtime::{ExecResult, RuntimeAdapter};

mod error;
pub use error::{Error, Result};

const WORKSPACE_PREFIX: &str = "/workspace";

/// A file that changed between the baseline snapshot and the current
/// workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub change_type: ChangeType,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// Result of running several commands sequentially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecBatchResult {
    pub steps: Vec<ExecResult>,
    pub success: bool,
    pub failed_at: Option<usize>,
}

/// One live shadow: owns the runtime handle and the host-side workspace
/// directory, and tracks a file-hash baseline for `diff`.
///
/// The baseline is behind a `Mutex` rather than requiring `&mut self` so
/// that a manager holding shared handles (e.g. in an id-keyed cache) can
/// still take and compare baselines.
pub struct ShadowEnvironment {
    adapter: RuntimeAdapter,
    container_name: String,
    workspace_host_dir: PathBuf,
    baseline: std::sync::Mutex<HashMap<String, String>>,
}

impl ShadowEnvironment {
    pub fn new(adapter: RuntimeAdapter, container_name: impl Into<String>, workspace_host_dir: PathBuf) -> Self {
        Self {
            adapter,
            container_name: container_name.into(),
            workspace_host_dir,
            baseline: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub async fn exec(&self, command: &[String], timeout: Duration) -> Result<ExecResult> {
        Ok(self
            .adapter
            .exec(&self.container_name, command, Some(WORKSPACE_PREFIX), &[], timeout)
            .await?)
    }

    /// Run `commands` sequentially. With `fail_fast` (the default), stops at
    /// the first non-zero exit and records its index; otherwise runs all and
    /// reports aggregate success.
    pub async fn exec_batch(
        &self,
        commands: &[Vec<String>],
        timeout: Duration,
        fail_fast: bool,
    ) -> Result<ExecBatchResult> {
        let mut steps = Vec::with_capacity(commands.len());
        let mut failed_at = None;

        for (i, command) in commands.iter().enumerate() {
            let result = self.exec(command, timeout).await?;
            let failed = !result.success();
            steps.push(result);
            if failed {
                if failed_at.is_none() {
                    failed_at = Some(i);
                }
                if fail_fast {
                    break;
                }
            }
        }

        Ok(ExecBatchResult {
            success: failed_at.is_none(),
            failed_at,
            steps,
        })
    }

    /// Hand over the terminal to an interactive shell. Only returns on
    /// failure to start.
    #[cfg(unix)]
    pub fn shell(&self) -> shadow_runtime::Error {
        self.adapter
            .exec_interactive(&self.container_name, "/bin/bash", Some(WORKSPACE_PREFIX))
    }

    pub async fn is_running(&self) -> Result<bool> {
        Ok(self.adapter.is_running(&self.container_name).await?)
    }

    /// Take (or replace) the baseline used by [`Self::diff`].
    pub fn snapshot_baseline(&self) -> Result<()> {
        let hashes = hash_tree(&self.workspace_host_dir)?;
        *self.baseline.lock().unwrap() = hashes;
        Ok(())
    }

    /// Compare the current workspace against the baseline, optionally
    /// filtered to files under `subtree`.
    pub fn diff(&self, subtree: Option<&str>) -> Result<Vec<ChangedFile>> {
        let current = hash_tree(&self.workspace_host_dir)?;
        let mut changes = Vec::new();
        let baseline = self.baseline.lock().unwrap();

        for (path, hash) in &current {
            if let Some(prefix) = subtree {
                if !path.starts_with(prefix) {
                    continue;
                }
            }
            match baseline.get(path) {
                None => changes.push(ChangedFile {
                    path: path.clone(),
                    change_type: ChangeType::Added,
                    size: file_size(&self.workspace_host_dir.join(path)),
                }),
                Some(old) if old != hash => changes.push(ChangedFile {
                    path: path.clone(),
                    change_type: ChangeType::Modified,
                    size: file_size(&self.workspace_host_dir.join(path)),
                }),
                _ => {}
            }
        }

        for path in baseline.keys() {
            if let Some(prefix) = subtree {
                if !path.starts_with(prefix) {
                    continue;
                }
            }
            if !current.contains_key(path) {
                changes.push(ChangedFile {
                    path: path.clone(),
                    change_type: ChangeType::Deleted,
                    size: None,
                });
            }
        }

        Ok(changes)
    }

    /// Copy `container_path` (which must be under `/workspace`) to
    /// `host_path`. Returns the total bytes written.
    pub fn extract(&self, container_path: &str, host_path: &Path) -> Result<u64> {
        let source = self.resolve_workspace_path(container_path)?;
        if !source.exists() {
            return Err(Error::NotFound {
                path: container_path.to_string(),
            });
        }
        copy_recursive(&source, host_path)
    }

    /// Copy `host_path` to `container_path` (which must be under
    /// `/workspace`). Parent directories are created as needed.
    pub fn inject(&self, host_path: &Path, container_path: &str) -> Result<u64> {
        if !host_path.exists() {
            return Err(Error::NotFound {
                path: host_path.display().to_string(),
            });
        }
        let dest = self.resolve_workspace_path(container_path)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        copy_recursive(host_path, &dest)
    }

    fn resolve_workspace_path(&self, container_path: &str) -> Result<PathBuf> {
        let rel = container_path.strip_prefix(WORKSPACE_PREFIX).ok_or_else(|| {
            Error::InvalidContainerPath {
                path: container_path.to_string(),
            }
        })?;
        let rel = rel.trim_start_matches('/');
        Ok(self.workspace_host_dir.join(rel))
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn copy_recursive(src: &Path, dst: &Path) -> Result<u64> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_dir() {
        std::fs::create_dir_all(dst)?;
        let mut total = 0;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            total += copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
        Ok(total)
    } else {
        std::fs::copy(src, dst).map_err(Error::from)
    }
}

/// Hash every file under `root`, keyed by root-relative path with forward
/// slashes. Files are read in bounded streaming chunks. Symlinks are
/// followed to their target's content only if the target lies within
/// `root`; otherwise they are hashed as opaque links (by their target
/// string) so escaping links don't require following arbitrary paths.
fn hash_tree(root: &Path) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    if !root.exists() {
        return Ok(out);
    }
    walk(root, root, &mut out)?;
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut HashMap<String, String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = std::fs::symlink_metadata(&path)?;

        if meta.is_dir() {
            walk(root, &path, out)?;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");

        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path)?;
            let resolved = if target.is_relative() {
                path.parent().unwrap_or(root).join(&target)
            } else {
                target.clone()
            };
            if resolved.starts_with(root) {
                out.insert(rel, hash_file(&resolved)?);
            } else {
                out.insert(rel, hash_bytes(target.to_string_lossy().as_bytes()));
            }
        } else {
            out.insert(rel, hash_file(&path)?);
        }
    }
    Ok(())
}

fn hash_file(path: &Path) -> Result<String> {
    use md5::{Digest, Md5};

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn hash_bytes(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_runtime::{ContainerBackend, RuntimeAdapter};

    fn env(dir: &Path) -> ShadowEnvironment {
        ShadowEnvironment::new(RuntimeAdapter::new(ContainerBackend::Podman), "shadow-test", dir.to_path_buf())
    }

    #[test]
    fn resolve_workspace_path_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let e = env(dir.path());
        assert!(matches!(
            e.resolve_workspace_path("/etc/passwd"),
            Err(Error::InvalidContainerPath { .. })
        ));
    }

    #[test]
    fn resolve_workspace_path_accepts_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let e = env(dir.path());
        let resolved = e.resolve_workspace_path("/workspace/sub/file.txt").unwrap();
        assert_eq!(resolved, dir.path().join("sub/file.txt"));
    }

    #[test]
    fn diff_detects_added_modified_deleted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        std::fs::write(dir.path().join("b.txt"), "two").unwrap();
        let e = env(dir.path());
        e.snapshot_baseline().unwrap();

        std::fs::write(dir.path().join("a.txt"), "one-changed").unwrap();
        std::fs::remove_file(dir.path().join("b.txt")).unwrap();
        std::fs::write(dir.path().join("c.txt"), "three").unwrap();

        let mut changes = e.diff(None).unwrap();
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].path, "a.txt");
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert_eq!(changes[1].path, "b.txt");
        assert_eq!(changes[1].change_type, ChangeType::Deleted);
        assert_eq!(changes[2].path, "c.txt");
        assert_eq!(changes[2].change_type, ChangeType::Added);
    }

    #[test]
    fn extract_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let e = env(dir.path());
        let dest = tempfile::tempdir().unwrap();
        let result = e.extract("/workspace/missing.txt", &dest.path().join("out.txt"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn inject_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let e = env(dir.path());
        let src = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(src.path(), "payload").unwrap();

        let bytes = e.inject(src.path(), "/workspace/nested/out.txt").unwrap();
        assert_eq!(bytes, 7);
        assert!(dir.path().join("nested/out.txt").exists());
    }
}
