//! Compiler options

use serde::{Deserialize, Serialize};

/// Compiler options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Largest user-data payload embedded inline, in bytes. Larger payloads
    /// are compressed, then uploaded and referenced with `#include`.
    pub max_user_data_size: usize,
    /// Inline single-file function code as `ZipFile` instead of uploading
    /// it, for runtimes that accept inline code.
    pub inline_function_files: bool,
    /// File name appended when a template path names a directory.
    pub default_filename: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_user_data_size: 16384,
            inline_function_files: false,
            default_filename: "cloud-formation.yaml".to_string(),
        }
    }
}
