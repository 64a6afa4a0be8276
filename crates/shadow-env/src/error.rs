//! Error type for the shadow environment handle.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container path outside /workspace: {path}")]
    InvalidContainerPath { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("container runtime error: {0}")]
    Runtime(#[from] shadow_runtime::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
