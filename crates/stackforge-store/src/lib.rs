//! Stackforge Artifact Store
//!
//! Content-addressed storage for payloads produced while compiling
//! templates: packaged function code, nested templates, oversized
//! cloud-init documents and the compiled root template itself.
//!
//! ## Key Principle
//!
//! An artifact is stored once per distinct content. Uploading the same
//! bytes again returns the locator of the existing object without writing,
//! so recompiling an unchanged template yields byte-identical locators and
//! the orchestration service sees no change.
//!
//! Object keys have the form
//! `<prefix>/<hash[0]>/<hash[1..3]>/<hash>/<logical-name>`.
//!
//! ## Backends
//!
//! [`BlobBackend`] is the seam to the actual blob namespace.
//! [`MemoryBackend`] ships here for development and testing; the S3
//! implementation lives in `stackforge-aws`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod artifact;
pub mod backend;
pub mod config;
pub mod error;
pub mod memory;

// Re-exports
pub use artifact::{artifact_name, content_digest, gzip, ArtifactStore};
pub use backend::{BlobBackend, BlobObject, Locator};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
