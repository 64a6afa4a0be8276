//! Uniform surface over two equivalent local container engines (podman,
//! docker). Neither engine's command-line surface leaks above this adapter.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

mod error;
pub use error::{Error, Result};

/// Container engine selected for this adapter. Podman is preferred because it
/// runs rootless; docker is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerBackend {
    Podman,
    Docker,
}

impl ContainerBackend {
    fn binary(self) -> &'static str {
        match self {
            ContainerBackend::Podman => "podman",
            ContainerBackend::Docker => "docker",
        }
    }
}

/// Detect the preferred backend by probing for its executable on `PATH`.
pub fn detect_backend() -> Option<ContainerBackend> {
    for backend in [ContainerBackend::Podman, ContainerBackend::Docker] {
        if which(backend.binary()) {
            return Some(backend);
        }
    }
    None
}

fn which(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(binary);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}

/// A single host-to-container bind mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub host_path: std::path::PathBuf,
    pub container_path: String,
    pub readonly: bool,
}

impl Mount {
    pub fn to_arg(&self) -> String {
        let mode = if self.readonly { "ro" } else { "rw" };
        format!("{}:{}:{}", self.host_path.display(), self.container_path, mode)
    }
}

/// Resource limits applied to every container `run` (the security floor).
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub memory_limit: String,
    pub pids_limit: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_limit: "4g".to_string(),
            pids_limit: 256,
        }
    }
}

/// Result of a subprocess or in-container command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into an error carrying the command's output.
    pub fn into_result(self, message: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::StartFailed {
                message: format!("{message}: exit_code={}\nstderr: {}", self.exit_code, self.stderr),
            })
        }
    }
}

/// Adapter over a detected container backend.
#[derive(Clone)]
pub struct RuntimeAdapter {
    backend: ContainerBackend,
}

impl RuntimeAdapter {
    pub fn new(backend: ContainerBackend) -> Self {
        Self { backend }
    }

    pub fn detect() -> Result<Self> {
        detect_backend().map(Self::new).ok_or(Error::RuntimeUnavailable)
    }

    pub fn backend(&self) -> ContainerBackend {
        self.backend
    }

    fn command(&self) -> Command {
        Command::new(self.backend.binary())
    }

    /// Start a detached container with the security floor applied: all
    /// capabilities dropped, no-new-privileges, a memory limit, and a
    /// process-count limit. Callers cannot request privileged mode.
    pub async fn run(
        &self,
        image: &str,
        name: &str,
        mounts: &[Mount],
        env: &[(String, String)],
        limits: &ResourceLimits,
    ) -> Result<String> {
        let mut cmd = self.command();
        cmd.args([
            "run",
            "-d",
            "--name",
            name,
            "--cap-drop=ALL",
            "--security-opt=no-new-privileges",
            "--memory",
            &limits.memory_limit,
            "--pids-limit",
            &limits.pids_limit.to_string(),
        ]);
        for mount in mounts {
            cmd.args(["-v", &mount.to_arg()]);
        }
        for (key, value) in env {
            cmd.args(["-e", &format!("{key}={value}")]);
        }
        cmd.arg(image);

        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::StartFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Execute a command inside `container`, honoring `timeout`. Returns a
    /// timeout error distinct from a non-zero exit.
    pub async fn exec(
        &self,
        container: &str,
        command: &[String],
        workdir: Option<&str>,
        env: &[(String, String)],
        timeout: Duration,
    ) -> Result<ExecResult> {
        let mut cmd = self.command();
        cmd.arg("exec");
        if let Some(dir) = workdir {
            cmd.args(["-w", dir]);
        }
        for (key, value) in env {
            cmd.args(["-e", &format!("{key}={value}")]);
        }
        cmd.arg(container);
        cmd.args(command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        run_with_timeout(&mut child, timeout).await
    }

    /// Replace the calling process with an interactive shell attached to the
    /// container. Only returns if `execvp` itself fails to start.
    #[cfg(unix)]
    pub fn exec_interactive(&self, container: &str, shell: &str, workdir: Option<&str>) -> Error {
        use std::ffi::CString;

        let mut args = vec!["exec".to_string(), "-it".to_string()];
        if let Some(dir) = workdir {
            args.push("-w".to_string());
            args.push(dir.to_string());
        }
        args.push(container.to_string());
        args.push(shell.to_string());

        let program = CString::new(self.backend.binary()).unwrap();
        let mut argv: Vec<CString> = vec![program.clone()];
        argv.extend(args.into_iter().map(|a| CString::new(a).unwrap()));

        match nix::unistd::execvp(&program, &argv) {
            Err(e) => Error::StartFailed {
                message: format!("exec_interactive failed: {e}"),
            },
        }
    }

    pub async fn stop(&self, container: &str, timeout: Duration) -> Result<()> {
        let output = self
            .command()
            .args(["stop", "-t", &timeout.as_secs().to_string(), container])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            tracing::debug!(container, "stop failed (container may already be stopped)");
        }
        Ok(())
    }

    pub async fn remove(&self, container: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(container);
        let output = self
            .command()
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() && !force {
            return Err(Error::StartFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    pub async fn exists(&self, container: &str) -> Result<bool> {
        let output = self
            .command()
            .args(["inspect", container])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(output.success())
    }

    pub async fn is_running(&self, container: &str) -> Result<bool> {
        let output = self
            .command()
            .args(["inspect", "-f", "{{.State.Running}}", container])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    pub async fn logs(&self, container: &str, tail: u32) -> Result<String> {
        let output = self
            .command()
            .args(["logs", "--tail", &tail.to_string(), container])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

/// Await `child` up to `timeout`, collecting stdout/stderr as they stream.
/// On expiry, sends SIGTERM, waits briefly, then SIGKILL.
async fn run_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExecResult> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collect = async {
        let mut out = String::new();
        let mut err = String::new();
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                out.push_str(&line);
                out.push('\n');
            }
        }
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                err.push_str(&line);
                err.push('\n');
            }
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status.code().unwrap_or(-1), out, err))
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok(Ok((exit_code, stdout, stderr))) => Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
        }),
        Ok(Err(e)) => Err(Error::Io(e)),
        Err(_) => {
            terminate(child).await;
            Err(Error::Timeout(timeout))
        }
    }
}

#[cfg(unix)]
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
        if tokio::time::timeout(Duration::from_secs(5), child.wait()).await.is_err() {
            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
            let _ = child.wait().await;
        }
    } else {
        let _ = child.kill().await;
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) {
    let _ = child.kill().await;
}

/// Used by the Image Builder to resolve build-context paths; kept here so
/// both crates agree on how a host path is validated before being handed to
/// the runtime binary.
pub fn assert_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_arg_formats_readonly() {
        let mount = Mount {
            host_path: "/host".into(),
            container_path: "/container".to_string(),
            readonly: true,
        };
        assert_eq!(mount.to_arg(), "/host:/container:ro");
    }

    #[test]
    fn mount_arg_formats_readwrite() {
        let mount = Mount {
            host_path: "/host".into(),
            container_path: "/container".to_string(),
            readonly: false,
        };
        assert_eq!(mount.to_arg(), "/host:/container:rw");
    }

    #[test]
    fn exec_result_success() {
        let ok = ExecResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(ok.success());
        assert!(ok.into_result("should not fail").is_ok());
    }

    #[test]
    fn exec_result_failure_carries_output() {
        let failed = ExecResult {
            exit_code: 1,
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert!(!failed.success());
        let err = failed.into_result("step failed").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn default_resource_limits_match_security_floor() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_limit, "4g");
        assert_eq!(limits.pids_limit, 256);
    }
}
