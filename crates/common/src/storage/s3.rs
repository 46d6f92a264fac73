//! S3 (and S3-compatible) blob store

use super::BlobStore;
use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::{debug, info};

/// Blob store backed by a single S3 bucket
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a client from the default AWS provider chain plus overrides
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            // MinIO and friends only serve path-style requests
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(bucket = %config.bucket, endpoint = ?config.endpoint, "S3 blob store ready");

        Self::with_client(S3Client::from_conf(builder.build()), &config.bucket)
    }

    /// Create with an existing client
    pub fn with_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to write {}: {}", key, e),
            })?;

        debug!(key, size, "Blob written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to delete {}: {}", key, e),
            })?;

        debug!(key, "Blob deleted");
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        // Presigning never talks to S3, so check the object exists first
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false);
                if missing {
                    AppError::BlobNotFound { key: key.to_string() }
                } else {
                    AppError::Storage {
                        message: format!("Failed to stat {}: {}", key, e),
                    }
                }
            })?;

        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| AppError::Storage {
            message: format!("Invalid signed URL lifetime: {}", e),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to sign {}: {}", key, e),
            })?;

        Ok(request.uri().to_string())
    }
}
