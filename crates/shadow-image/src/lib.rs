//! Builds and verifies the shadow container base image on demand, from
//! container build assets bundled with this crate.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

mod error;
pub use error::{Error, Result};

/// Default local image tag (no registry prefix — built and used only
/// locally).
pub const DEFAULT_IMAGE_NAME: &str = "shadow-engine:local";

/// Builds and checks for the shadow base image using a detected container
/// backend's CLI directly (the build step predates any running container, so
/// it talks to the backend binary rather than going through
/// `shadow_runtime::RuntimeAdapter`, which only models already-running
/// containers).
pub struct ImageBuilder {
    binary: String,
}

impl ImageBuilder {
    pub fn new(backend: shadow_runtime::ContainerBackend) -> Self {
        Self {
            binary: match backend {
                shadow_runtime::ContainerBackend::Podman => "podman".to_string(),
                shadow_runtime::ContainerBackend::Docker => "docker".to_string(),
            },
        }
    }

    pub async fn image_exists(&self, tag: &str) -> bool {
        Command::new(&self.binary)
            .args(["image", "inspect", tag])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build `tag` from the bundled container context, streaming each output
    /// line to `progress`.
    pub async fn build(&self, tag: &str, mut progress: impl FnMut(&str)) -> Result<String> {
        let container_dir = container_dir()?;
        progress(&format!("Building image {tag} from {}", container_dir.display()));

        let mut child = Command::new(&self.binary)
            .args(["build", "-t", tag])
            .arg(&container_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut lines = Vec::new();
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();

        loop {
            tokio::select! {
                line = stdout_reader.next_line() => {
                    match line {
                        Ok(Some(l)) => { progress(&l); lines.push(l); }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                line = stderr_reader.next_line() => {
                    match line {
                        Ok(Some(l)) => { progress(&l); lines.push(l); }
                        Ok(None) => {}
                        Err(_) => {}
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let tail: Vec<&str> = lines.iter().rev().take(10).rev().map(|s| s.as_str()).collect();
            return Err(Error::ImageUnavailable {
                reason: tail.join("\n"),
            });
        }
        Ok(tag.to_string())
    }

    /// Build `tag` only if it does not already exist locally.
    pub async fn ensure_image(&self, tag: &str, progress: impl FnMut(&str)) -> Result<String> {
        if self.image_exists(tag).await {
            return Ok(tag.to_string());
        }
        self.build(tag, progress).await
    }
}

/// Resolve the bundled `container/` directory (Dockerfile + scripts),
/// shipped alongside this crate's sources.
fn container_dir() -> Result<PathBuf> {
    let dev_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("container");
    if dev_path.join("Dockerfile").exists() {
        return Ok(dev_path);
    }
    Err(Error::AssetsNotFound)
}

pub fn bundled_container_dir() -> Result<PathBuf> {
    container_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_dir_contains_dockerfile() {
        let dir = container_dir().unwrap();
        assert!(dir.join("Dockerfile").exists());
    }

    #[test]
    fn default_image_name_has_local_tag() {
        assert!(DEFAULT_IMAGE_NAME.ends_with(":local"));
    }
}
