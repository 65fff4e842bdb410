use thiserror::Error;

/// Controller error types
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("dimension mismatch: expected {expected} joints, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("controller not ready: no joint sample received yet")]
    NotReady,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
