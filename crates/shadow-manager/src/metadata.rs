//! On-disk persistence format (`metadata.json`) and the serializable
//! projection used for tool output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One repository source as recorded in `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_commit: Option<String>,
}

/// The full on-disk record for one shadow. Fields this version does not
/// recognize are preserved in `extra` and re-emitted on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub container_name: String,
    pub sources: Vec<SourceMeta>,
    pub created_at: DateTime<Utc>,
    pub image: String,
    pub env_vars_passed: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Runtime status of a shadow environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowStatus {
    Ready,
    Error,
    Destroyed,
}

/// Serializable projection of a shadow environment. Contains no secrets —
/// env-var *names* only, never values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowInfo {
    pub shadow_id: String,
    pub repos: Vec<String>,
    pub status: ShadowStatus,
    pub created_at: DateTime<Utc>,
    pub shadow_dir: String,
    pub env_vars_passed: Vec<String>,
}
