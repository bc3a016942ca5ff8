//! Store error types

use thiserror::Error;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Bucket provisioning failed: {0}")]
    Provisioning(String),

    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
