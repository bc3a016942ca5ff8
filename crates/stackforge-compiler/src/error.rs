//! Compiler error types

use std::path::PathBuf;

use stackforge_store::StoreError;
use thiserror::Error;

use crate::fetch::FetchError;

/// Compile errors. All of them abort compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Error parsing {} at line {line} column {column}:\n{excerpt}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        excerpt: String,
    },

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} does not contain a template mapping", path.display())]
    InvalidDocument { path: PathBuf },

    #[error("Reference {0} can't be resolved")]
    UnresolvedReference(String),

    #[error("Value {0} is not a valid value or reference")]
    InvalidReference(String),

    #[error("Error compiling {include} - duplicate '{category}' item: {key}")]
    DuplicateItem {
        include: String,
        category: String,
        key: String,
    },

    #[error("Error compiling {include} - conflicting types for '{category}'")]
    ConflictingTypes { include: String, category: String },

    #[error("Error compiling {include} - cannot merge non-list non-mapping '{category}'")]
    Unmergeable { include: String, category: String },

    #[error("Include cycle detected: {chain}")]
    IncludeCycle { chain: String },

    #[error("Error compiling {} - include items must be paths, found {item}", path.display())]
    InvalidInclude { path: PathBuf, item: String },

    #[error("Error embedding {field} of {resource}: {source}")]
    Payload {
        resource: String,
        field: String,
        #[source]
        source: Box<CompileError>,
    },

    #[error("{} - {message}", path.display())]
    CloudInit { path: PathBuf, message: String },

    #[error("Error packaging {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl CompileError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
