//! S3 implementation of the blob store.
//!
//! Uses HeadObject for existence probes (no payload transfer), GetObject for
//! downloads and PutObject for overwrite-uploads. All S3 failures other than
//! a missing object map to `Transient` so the queue drives retries.

use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::BlobStore;

/// Blob store backed by an S3 bucket.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from the storage configuration.
    ///
    /// Credentials come from the standard AWS provider chain; region and
    /// endpoint can be overridden for S3-compatible stores.
    pub async fn new(cfg: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()));
        if let Some(ref endpoint) = cfg.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let aws_config = loader.load().await;
        let client = Client::new(&aws_config);

        info!(bucket = %cfg.bucket, region = %cfg.region, "S3 blob store initialized");

        Self {
            client,
            bucket: cfg.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(PipelineError::Transient(format!(
                        "head_object {path}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PipelineError::Transient(format!("get_object {path}: {e}")))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::Transient(format!("read body {path}: {e}")))?
            .into_bytes();

        debug!(path = %path, size = data.len(), "Blob downloaded");
        Ok(data)
    }

    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| PipelineError::Transient(format!("put_object {path}: {e}")))?;

        debug!(path = %path, size = size, "Blob uploaded");
        Ok(())
    }
}
