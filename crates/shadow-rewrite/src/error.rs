//! Error type for the rewrite installer.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rewrite rules not applied for {spec}")]
    NotApplied { spec: String },

    #[error("container runtime error: {0}")]
    Runtime(#[from] shadow_runtime::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
