//! Aggregate error type for the shadow lifecycle engine, covering every
//! error kind named by the engine's public contract.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    #[error("invalid local path: {path}")]
    InvalidLocalPath { path: String },

    #[error("snapshot failed: {message}")]
    SnapshotFailed { message: String },

    #[error("image unavailable: {message}")]
    ImageUnavailable { message: String },

    #[error("container runtime unavailable")]
    ContainerRuntimeUnavailable,

    #[error("container start failed: {message}")]
    ContainerStartFailed { message: String },

    #[error("container not running: {container}")]
    ContainerNotRunning { container: String },

    #[error("forge not ready: {message}")]
    ForgeNotReady { message: String },

    #[error("forge error on {endpoint}: HTTP {status}: {body}")]
    ForgeError {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("rewrite rules not applied for {spec}")]
    RewriteNotApplied { spec: String },

    #[error("operation timed out: {message}")]
    Timeout { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<shadow_spec::Error> for Error {
    fn from(e: shadow_spec::Error) -> Self {
        match e {
            shadow_spec::Error::InvalidInput { message } => Error::InvalidInput { message },
            shadow_spec::Error::InvalidLocalPath { path } => Error::InvalidLocalPath { path },
        }
    }
}

impl From<shadow_snapshot::Error> for Error {
    fn from(e: shadow_snapshot::Error) -> Self {
        match e {
            shadow_snapshot::Error::InvalidLocalPath { path } => Error::InvalidLocalPath { path },
            shadow_snapshot::Error::SnapshotFailed { message } => Error::SnapshotFailed { message },
            shadow_snapshot::Error::Io(e) => Error::Io(e),
        }
    }
}

impl From<shadow_runtime::Error> for Error {
    fn from(e: shadow_runtime::Error) -> Self {
        match e {
            shadow_runtime::Error::RuntimeUnavailable => Error::ContainerRuntimeUnavailable,
            shadow_runtime::Error::StartFailed { message } => Error::ContainerStartFailed { message },
            shadow_runtime::Error::NotRunning { container } => Error::ContainerNotRunning { container },
            shadow_runtime::Error::Timeout(d) => Error::Timeout {
                message: format!("exceeded {d:?}"),
            },
            shadow_runtime::Error::Cancelled => Error::Cancelled,
            shadow_runtime::Error::Io(e) => Error::Io(e),
        }
    }
}

impl From<shadow_image::Error> for Error {
    fn from(e: shadow_image::Error) -> Self {
        match e {
            shadow_image::Error::ImageUnavailable { reason } => Error::ImageUnavailable { message: reason },
            shadow_image::Error::AssetsNotFound => Error::ImageUnavailable {
                message: "bundled container build assets not found".to_string(),
            },
            shadow_image::Error::Io(e) => Error::Io(e),
        }
    }
}

impl From<shadow_forge::Error> for Error {
    fn from(e: shadow_forge::Error) -> Self {
        match e {
            shadow_forge::Error::NotReady(d) => Error::ForgeNotReady {
                message: format!("not ready after {d:?}"),
            },
            shadow_forge::Error::ForgeError { endpoint, status, body } => {
                Error::ForgeError { endpoint, status, body }
            }
            shadow_forge::Error::Runtime(e) => e.into(),
        }
    }
}

impl From<shadow_rewrite::Error> for Error {
    fn from(e: shadow_rewrite::Error) -> Self {
        match e {
            shadow_rewrite::Error::NotApplied { spec } => Error::RewriteNotApplied { spec },
            shadow_rewrite::Error::Runtime(e) => e.into(),
        }
    }
}

impl From<shadow_env::Error> for Error {
    fn from(e: shadow_env::Error) -> Self {
        match e {
            shadow_env::Error::InvalidContainerPath { path } => Error::InvalidInput {
                message: format!("container path outside /workspace: {path}"),
            },
            shadow_env::Error::NotFound { path } => Error::NotFound { message: path },
            shadow_env::Error::Runtime(e) => e.into(),
            shadow_env::Error::Io(e) => Error::Io(e),
        }
    }
}
