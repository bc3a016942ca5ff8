//! Blob backend abstraction
//!
//! A backend owns one region-scoped blob namespace (bucket). It only needs
//! two operations: find an object by key prefix, and write an object.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where a stored object lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Bucket (namespace) name.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
    /// Public URL of the object.
    pub url: String,
}

/// An object to be written.
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    /// `Some("gzip")` when the body is compressed.
    pub content_encoding: Option<String>,
}

/// Blob namespace backend.
///
/// Implementations provision their namespace lazily on first use.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Find the first object whose key starts with `prefix`.
    async fn find(&self, prefix: &str) -> Result<Option<Locator>>;

    /// Write an object, replacing any object with the same key.
    async fn put(&self, object: BlobObject) -> Result<Locator>;
}
