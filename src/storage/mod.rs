//! Blob storage abstraction.
//!
//! The pipeline needs exactly three operations from its object store:
//! existence probe, full download, and overwrite-upload. Everything else
//! (versioning, listing, ACLs) stays outside this crate.

pub mod s3;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use s3::S3BlobStore;

/// Narrow object-store interface consumed by the resize workers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Download the full object at `path` into memory.
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// Upload `data` to `path`, replacing any existing object.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<()>;
}
