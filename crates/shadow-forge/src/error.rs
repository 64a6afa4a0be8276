//! Error type for the forge client.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("forge did not become ready within {0:?}")]
    NotReady(std::time::Duration),

    #[error("forge error on {endpoint}: HTTP {status}: {body}")]
    ForgeError {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("container runtime error: {0}")]
    Runtime(#[from] shadow_runtime::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
