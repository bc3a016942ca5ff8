//! Artifact store configuration

use serde::{Deserialize, Serialize};

/// Store configuration.
///
/// The defaults match the names existing buckets were created with, so
/// changing them orphans previously uploaded artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key prefix under which every artifact is stored.
    pub key_prefix: String,
    /// Bucket name prefix; the bucket is `<prefix>-<key>-<region>`.
    pub bucket_prefix: String,
    /// Length of the random key in newly provisioned bucket names.
    pub bucket_key_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "cf-compiled".to_string(),
            bucket_prefix: "cf-templates".to_string(),
            bucket_key_length: 12,
        }
    }
}
