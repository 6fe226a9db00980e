use thiserror::Error;

/// Failures raised by the stores. Storage failures are fatal for the call
/// that hit them; nothing is partially written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("version {0} already exists")]
    VersionExists(String),

    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),

    #[error("invalid artifact id: {0:?}")]
    InvalidId(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Matrix(#[from] crate::MatrixError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
