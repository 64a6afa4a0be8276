//! Pre- and post-create validation of host and environment (component I).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shadow_forge::ForgeClient;
use shadow_rewrite::RewriteInstaller;
use shadow_runtime::{ContainerBackend, RuntimeAdapter};

use crate::error::Result;
use crate::shadow::Shadow;
use crate::AUTO_PASSTHROUGH_ENV_VARS;

/// Tool binaries the shadow image must provide inside the container.
const REQUIRED_TOOL_BINARIES: &[&str] = &["git", "curl", "sh"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Degrade-gracefully hint attached when the host cannot create a shadow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackHint {
    pub reason: String,
    pub mode: String,
    pub can_create_shadow: bool,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub fallback: Option<FallbackHint>,
}

/// Pre-create preflight: no shadow id yet. Detects the container runtime,
/// its daemon reachability, and whether the base image already exists
/// (absent is reported but not fatal — the builder auto-builds it).
pub async fn preflight_host(image_tag: &str) -> PreflightReport {
    let mut checks = Vec::new();

    let backend = shadow_runtime::detect_backend();
    checks.push(CheckResult {
        name: "container_runtime_installed".to_string(),
        passed: backend.is_some(),
        detail: match backend {
            Some(b) => format!("found {:?}", b),
            None => "neither podman nor docker found on PATH".to_string(),
        },
    });

    let Some(backend) = backend else {
        checks.push(CheckResult {
            name: "container_daemon_reachable".to_string(),
            passed: false,
            detail: "skipped: no runtime installed".to_string(),
        });
        return PreflightReport {
            passed: false,
            checks,
            fallback: Some(FallbackHint {
                reason: "container_runtime_not_installed".to_string(),
                mode: "host".to_string(),
                can_create_shadow: false,
                recommended_action: "install podman or docker".to_string(),
            }),
        };
    };

    let daemon_ok = daemon_reachable(backend).await;
    checks.push(CheckResult {
        name: "container_daemon_reachable".to_string(),
        passed: daemon_ok,
        detail: if daemon_ok {
            "daemon responded".to_string()
        } else {
            "daemon did not respond to `info`".to_string()
        },
    });

    if !daemon_ok {
        return PreflightReport {
            passed: false,
            checks,
            fallback: Some(FallbackHint {
                reason: "container_daemon_unreachable".to_string(),
                mode: "host".to_string(),
                can_create_shadow: false,
                recommended_action: "start the container daemon".to_string(),
            }),
        };
    }

    let builder = shadow_image::ImageBuilder::new(backend);
    let image_present = builder.image_exists(image_tag).await;
    checks.push(CheckResult {
        name: "base_image_present".to_string(),
        passed: image_present,
        detail: if image_present {
            "image present".to_string()
        } else {
            "image absent, will be built on create".to_string()
        },
    });

    let found_keys: Vec<&str> = AUTO_PASSTHROUGH_ENV_VARS
        .iter()
        .copied()
        .filter(|name| std::env::var_os(name).is_some())
        .collect();
    checks.push(CheckResult {
        name: "api_keys_detected".to_string(),
        passed: true,
        detail: format!("found: {}", found_keys.join(", ")),
    });

    PreflightReport {
        passed: true,
        checks,
        fallback: None,
    }
}

async fn daemon_reachable(backend: ContainerBackend) -> bool {
    tokio::process::Command::new(match backend {
        ContainerBackend::Podman => "podman",
        ContainerBackend::Docker => "docker",
    })
    .arg("info")
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null())
    .status()
    .await
    .map(|s| s.success())
    .unwrap_or(false)
}

/// Environment preflight: container running, forge responsive, each spec's
/// repository present, required tool binaries present, at least one API-key
/// variable present in the container, rewrite rules installed.
pub async fn preflight_environment(shadow: &Shadow) -> Result<PreflightReport> {
    let mut checks = Vec::new();

    let running = shadow.is_running().await?;
    checks.push(CheckResult {
        name: "container_running".to_string(),
        passed: running,
        detail: format!("container {}", shadow.container_name),
    });

    if !running {
        return Ok(PreflightReport {
            passed: false,
            checks,
            fallback: None,
        });
    }

    let adapter = RuntimeAdapter::new(shadow.backend);
    let forge = ForgeClient::new(&adapter, shadow.container_name.clone());

    let forge_ready = forge.wait_ready(Duration::from_secs(1)).await.is_ok();
    checks.push(CheckResult {
        name: "forge_responsive".to_string(),
        passed: forge_ready,
        detail: "localhost:3000 inside container".to_string(),
    });

    for spec in &shadow.repos {
        let present = forge.repo_exists(&spec.org, &spec.name).await.unwrap_or(false);
        checks.push(CheckResult {
            name: format!("repo_present:{}", spec.full_name()),
            passed: present,
            detail: spec.full_name(),
        });
    }

    for tool in REQUIRED_TOOL_BINARIES {
        let result = adapter
            .exec(
                &shadow.container_name,
                &["which".to_string(), tool.to_string()],
                None,
                &[],
                Duration::from_secs(5),
            )
            .await;
        let present = result.map(|r| r.success()).unwrap_or(false);
        checks.push(CheckResult {
            name: format!("tool_present:{tool}"),
            passed: present,
            detail: (*tool).to_string(),
        });
    }

    let has_any_key = {
        let script = AUTO_PASSTHROUGH_ENV_VARS
            .iter()
            .map(|v| format!("[ -n \"${{{v}:-}}\" ]"))
            .collect::<Vec<_>>()
            .join(" || ");
        adapter
            .exec(
                &shadow.container_name,
                &["sh".to_string(), "-c".to_string(), script],
                None,
                &[],
                Duration::from_secs(5),
            )
            .await
            .map(|r| r.success())
            .unwrap_or(false)
    };
    checks.push(CheckResult {
        name: "api_key_present_in_container".to_string(),
        passed: has_any_key,
        detail: "checked auto-passthrough variable names".to_string(),
    });

    let installer = RewriteInstaller::new(&adapter, shadow.container_name.clone(), "github.com");
    let rewrite_ok = installer.verify(&shadow.repos).await.is_ok();
    checks.push(CheckResult {
        name: "rewrite_rules_installed".to_string(),
        passed: rewrite_ok,
        detail: "git config --global --get-regexp url.*insteadOf".to_string(),
    });

    let passed = checks.iter().all(|c| c.passed);
    Ok(PreflightReport {
        passed,
        checks,
        fallback: None,
    })
}

/// Health is the on-demand subset of the environment preflight, returned as
/// a diagnostic appendix on `status`.
pub async fn health(shadow: &Shadow) -> Result<PreflightReport> {
    preflight_environment(shadow).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmokeStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeTestResult {
    pub status: SmokeStatus,
    pub evidence: Option<String>,
}

/// Clone the first provisioned repository inside the container using the
/// public-forge URL (which must be transparently rewritten), check out the
/// expected `snapshot_commit`, and compare the leading 7 hex characters of
/// HEAD.
pub async fn run_smoke_test(shadow: &Shadow) -> Result<SmokeTestResult> {
    let Some(spec) = shadow.repos.first() else {
        return Ok(SmokeTestResult {
            status: SmokeStatus::Passed,
            evidence: Some("no repositories provisioned".to_string()),
        });
    };
    let expected = spec
        .snapshot_commit
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(7)
        .collect::<String>();

    let adapter = RuntimeAdapter::new(shadow.backend);
    let clone_dir = format!("/tmp/smoke-{}", spec.name);
    let script = format!(
        "set -e; rm -rf '{clone_dir}'; git clone https://github.com/{}/{} '{clone_dir}'; \
         cd '{clone_dir}'; git checkout -q {}; git rev-parse HEAD",
        spec.org,
        spec.name,
        spec.snapshot_commit.as_deref().unwrap_or("HEAD"),
    );
    let result = adapter
        .exec(
            &shadow.container_name,
            &["sh".to_string(), "-c".to_string(), script],
            None,
            &[],
            Duration::from_secs(60),
        )
        .await?;

    if !result.success() {
        return Ok(SmokeTestResult {
            status: SmokeStatus::Failed,
            evidence: Some(format!("clone/checkout failed: {}", result.stderr)),
        });
    }

    let actual = result.stdout.trim().chars().take(7).collect::<String>();
    if actual == expected {
        Ok(SmokeTestResult {
            status: SmokeStatus::Passed,
            evidence: Some(format!("expected={expected} actual={actual}")),
        })
    } else {
        Ok(SmokeTestResult {
            status: SmokeStatus::Failed,
            evidence: Some(format!("expected={expected} actual={actual}")),
        })
    }
}
