//! CLI error types

use stackforge_compiler::{CompileError, FetchError};
use stackforge_deploy::DeployError;
use stackforge_store::StoreError;
use stackforge_types::BindingsError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Monitored stack ended failed or rolled back
    #[error("Stack {stack} ended in {status}")]
    StackFailed { stack: String, status: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Bindings(#[from] BindingsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
