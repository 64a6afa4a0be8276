//! Error type for repository-spec parsing.

/// Errors produced while parsing or validating a [`crate::RepoSpec`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("not a git repository: {path}")]
    InvalidLocalPath { path: String },
}

impl Error {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_local_path<S: Into<String>>(path: S) -> Self {
        Self::InvalidLocalPath { path: path.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
