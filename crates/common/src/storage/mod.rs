//! Blob storage for contract documents
//!
//! Provides:
//! - The `BlobStore` abstraction (write, delete, signed URL)
//! - An S3 backend and an in-memory backend
//! - Storage key derivation for uploaded files

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Lifetime of signed retrieval URLs
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Object storage addressed by string keys
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    /// Remove the object under `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Time-limited URL granting read access to `key`. Fails for missing objects.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Build the blob store selected by configuration
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackendKind::S3 => Ok(Arc::new(S3BlobStore::from_config(config).await)),
        StorageBackendKind::Memory => Ok(Arc::new(MemoryBlobStore::new(&config.bucket))),
    }
}

/// Lower-cased suffix after the last `.` of a file name.
///
/// Names without a dot, ending in one, or made of nothing but the
/// extension (`.pdf`) have no extension.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Storage key for an uploaded contract: `{user_id}/contract_{random}.{ext}`
pub fn contract_key(user_id: Uuid, extension: &str) -> String {
    let fraction: f64 = rand::random();
    format!("{}/contract_{}.{}", user_id, fraction, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("lease.pdf").as_deref(), Some("pdf"));
        assert_eq!(file_extension("Master.Agreement.DOCX").as_deref(), Some("docx"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension(".pdf"), None);
        assert_eq!(file_extension("..pdf").as_deref(), Some("pdf"));
    }

    #[test]
    fn test_contract_key_layout() {
        let user = Uuid::new_v4();
        let key = contract_key(user, "pdf");

        let (prefix, name) = key.split_once('/').unwrap();
        assert_eq!(prefix, user.to_string());
        assert!(name.starts_with("contract_0."));
        assert!(name.ends_with(".pdf"));

        let fraction: f64 = name
            .trim_start_matches("contract_")
            .trim_end_matches(".pdf")
            .parse()
            .unwrap();
        assert!((0.0..1.0).contains(&fraction));
    }

    #[test]
    fn test_contract_keys_differ() {
        let user = Uuid::new_v4();
        assert_ne!(contract_key(user, "pdf"), contract_key(user, "pdf"));
    }

    #[test]
    fn test_signed_url_ttl_is_one_hour() {
        assert_eq!(SIGNED_URL_TTL.as_secs(), 3600);
    }
}
