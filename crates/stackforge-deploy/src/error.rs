//! Deployment error types

use stackforge_compiler::CompileError;
use stackforge_store::StoreError;
use thiserror::Error;

/// Error returned by a service client, classified by how callers react.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Service error: {0}")]
    Other(String),
}

impl ServiceError {
    /// Whether the service reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Validation(msg) if msg.contains("does not exist"))
    }

    /// Whether an update was rejected because nothing changed.
    pub fn is_no_op_update(&self) -> bool {
        matches!(self, ServiceError::Validation(msg) if msg.contains("No updates are to be performed"))
    }
}

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stack {stack} does not exist")]
    NotFound { stack: String },

    #[error("Transient failure persisted: {0}")]
    Transient(String),

    #[error("Authentication failed, please re-authenticate: {0}")]
    Auth(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Fleet(String),
}

impl DeployError {
    /// Translate a service error for an operation on `stack`.
    pub fn from_service(err: ServiceError, stack: &str) -> Self {
        if err.is_not_found() {
            return DeployError::NotFound {
                stack: stack.to_string(),
            };
        }
        match err {
            ServiceError::Validation(msg) => DeployError::Validation(msg),
            ServiceError::Auth(msg) => DeployError::Auth(msg),
            ServiceError::Throttled(msg) | ServiceError::Network(msg) => {
                DeployError::Transient(msg)
            }
            ServiceError::Other(msg) => DeployError::Service(msg),
        }
    }
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;
