//! In-memory blob backend
//!
//! Suitable for development and testing. Counts writes so callers can
//! assert that content-addressed uploads are not repeated.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::backend::{BlobBackend, BlobObject, Locator};
use crate::error::Result;

/// A stored object as seen by tests.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: Option<String>,
}

/// In-memory blob backend
pub struct MemoryBackend {
    bucket: String,
    objects: DashMap<String, StoredBlob>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_bucket("cf-templates-memory")
    }

    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `put` calls served.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get a stored object by key.
    pub fn object(&self, key: &str) -> Option<StoredBlob> {
        self.objects.get(key).map(|o| o.clone())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn locator(&self, key: &str) -> Locator {
        Locator {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            url: format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn find(&self, prefix: &str) -> Result<Option<Locator>> {
        let first = self
            .objects
            .iter()
            .map(|e| e.key().clone())
            .filter(|key| key.starts_with(prefix))
            .min();
        Ok(first.map(|key| self.locator(&key)))
    }

    async fn put(&self, object: BlobObject) -> Result<Locator> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let locator = self.locator(&object.key);
        self.objects.insert(
            object.key,
            StoredBlob {
                body: object.body,
                content_type: object.content_type,
                content_encoding: object.content_encoding,
            },
        );
        Ok(locator)
    }
}
