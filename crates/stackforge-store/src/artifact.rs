//! Content-addressed artifact store

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info, instrument};

use crate::backend::{BlobBackend, BlobObject, Locator};
use crate::config::StoreConfig;
use crate::error::Result;

/// Directory under the key prefix holding source validator markers.
const VALIDATED_DIR: &str = "validated";

/// Hex content hash used to address artifacts.
pub fn content_digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Gzip a payload.
pub fn gzip(content: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}

/// Logical name for a new artifact: `<working-dir>-<timestamp>.<ext>`.
pub fn artifact_name(ext: &str) -> String {
    let dir = std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "stackforge".to_string());
    let base = format!("{}-{}", dir, chrono::Local::now().format("%Y%m%d%H%M%S"));
    if ext.is_empty() {
        base
    } else {
        format!("{base}.{ext}")
    }
}

/// Artifact store over a blob backend.
///
/// The existence check and the write are not atomic. Two concurrent
/// uploads of the same new content both write, but to the same key with
/// the same bytes.
#[derive(Clone)]
pub struct ArtifactStore {
    backend: Arc<dyn BlobBackend>,
    config: StoreConfig,
}

impl ArtifactStore {
    /// Create a store over `backend`.
    pub fn new(backend: Arc<dyn BlobBackend>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Key prefix under which the artifact with `digest` is stored.
    pub fn object_prefix(&self, digest: &str) -> String {
        format!(
            "{}/{}/{}/{}/",
            self.config.key_prefix,
            &digest[..1],
            &digest[1..3],
            digest
        )
    }

    /// Upload `content` under the name `name`, reusing an existing copy.
    ///
    /// When `compress` is set the stored body is gzipped and marked with a
    /// `gzip` content encoding. The address is always derived from the
    /// uncompressed content.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn upload(
        &self,
        name: &str,
        content: &[u8],
        content_type: &str,
        compress: bool,
    ) -> Result<Locator> {
        let digest = content_digest(content);
        self.store(&digest, name, content, content_type, compress)
            .await
    }

    /// Key prefix of the markers recorded for a source validator.
    pub fn validator_prefix(&self, validator: &str) -> String {
        format!(
            "{}/{}/{}/",
            self.config.key_prefix,
            VALIDATED_DIR,
            content_digest(validator.as_bytes())
        )
    }

    /// Look up an artifact previously stored for a source validator,
    /// such as an HTTP entity tag combined with its URL.
    ///
    /// The validator marker names the content digest; the artifact itself
    /// lives at its content address.
    pub async fn find_validated(&self, validator: &str) -> Result<Option<Locator>> {
        let Some(marker) = self.backend.find(&self.validator_prefix(validator)).await? else {
            return Ok(None);
        };
        let digest = marker.key.rsplit('/').next().unwrap_or_default();
        if digest.len() < 3 {
            return Ok(None);
        }
        self.backend.find(&self.object_prefix(digest)).await
    }

    /// Upload content fetched from a validated source.
    ///
    /// The body is stored by content like any other artifact, and an empty
    /// marker `<prefix>/validated/<validator hash>/<content hash>` records
    /// it so the next lookup can skip fetching.
    pub async fn upload_validated(
        &self,
        validator: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<Locator> {
        let digest = content_digest(content);
        let locator = self
            .store(&digest, name, content, content_type, false)
            .await?;

        let marker = format!("{}{}", self.validator_prefix(validator), digest);
        if self.backend.find(&marker).await?.is_none() {
            self.backend
                .put(BlobObject {
                    key: marker,
                    body: Bytes::new(),
                    content_type: "text/plain".to_string(),
                    content_encoding: None,
                })
                .await?;
        }
        Ok(locator)
    }

    async fn store(
        &self,
        digest: &str,
        name: &str,
        content: &[u8],
        content_type: &str,
        compress: bool,
    ) -> Result<Locator> {
        let prefix = self.object_prefix(digest);
        if let Some(existing) = self.backend.find(&prefix).await? {
            debug!(key = %existing.key, "Re-using cached object");
            return Ok(existing);
        }

        let (body, content_encoding) = if compress {
            (Bytes::from(gzip(content)?), Some("gzip".to_string()))
        } else {
            (Bytes::copy_from_slice(content), None)
        };

        let locator = self
            .backend
            .put(BlobObject {
                key: format!("{prefix}{name}"),
                body,
                content_type: content_type.to_string(),
                content_encoding,
            })
            .await?;
        info!(url = %locator.url, "Uploaded artifact");
        Ok(locator)
    }
}
