//! Error type for the snapshot engine.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a git repository: {path}")]
    InvalidLocalPath { path: String },

    #[error("snapshot failed: {message}")]
    SnapshotFailed { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_local_path<S: Into<String>>(path: S) -> Self {
        Self::InvalidLocalPath { path: path.into() }
    }

    pub fn snapshot_failed<S: Into<String>>(message: S) -> Self {
        Self::SnapshotFailed {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
