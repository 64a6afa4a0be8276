//! Error type for the container runtime adapter.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no supported container runtime found (tried podman, docker)")]
    RuntimeUnavailable,

    #[error("container start failed: {message}")]
    StartFailed { message: String },

    #[error("container is not running: {container}")]
    NotRunning { container: String },

    #[error("command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("command was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
