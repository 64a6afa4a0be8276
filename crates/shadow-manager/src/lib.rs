//! Shadow lifecycle orchestration: owns the on-disk environment store and
//! drives the other `shadow-*` crates through the ordered `create` sequence,
//! plus add/sync/get/destroy and preflight/health/smoke diagnostics.

mod error;
mod manager;
mod metadata;
mod preflight;
mod shadow;

pub use error::{Error, Result};
pub use manager::{CreateOptions, ShadowManager, AUTO_PASSTHROUGH_ENV_VARS};
pub use metadata::{Metadata, ShadowInfo, ShadowStatus, SourceMeta};
pub use preflight::{
    health, preflight_environment, preflight_host, run_smoke_test, CheckResult, FallbackHint,
    PreflightReport, SmokeStatus, SmokeTestResult,
};
pub use shadow::Shadow;

pub use shadow_env::{ChangedFile, ChangeType, ExecBatchResult};
pub use shadow_image::DEFAULT_IMAGE_NAME;
pub use shadow_runtime::{ExecResult, Mount};
pub use shadow_spec::RepoSpec;
