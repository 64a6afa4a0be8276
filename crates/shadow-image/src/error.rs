//! Error type for the image builder.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("image unavailable: {reason}")]
    ImageUnavailable { reason: String },

    #[error("could not locate bundled container build assets")]
    AssetsNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
