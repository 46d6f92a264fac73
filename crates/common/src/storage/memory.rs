//! In-process blob store for local runs and tests

use super::BlobStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

type KeyPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Blob store keeping objects in a map
pub struct MemoryBlobStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredBlob>>,
    deleted: RwLock<Vec<String>>,
    fail_writes_when: RwLock<Option<KeyPredicate>>,
    fail_signing: RwLock<bool>,
    fail_deletes: RwLock<bool>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
            deleted: RwLock::new(Vec::new()),
            fail_writes_when: RwLock::new(None),
            fail_signing: RwLock::new(false),
            fail_deletes: RwLock::new(false),
        }
    }

    /// Reject writes for keys matching `predicate`
    pub async fn fail_writes_when<F>(&self, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        *self.fail_writes_when.write().await = Some(Arc::new(predicate));
    }

    /// Make every signed URL request fail
    pub async fn fail_signing(&self, fail: bool) {
        *self.fail_signing.write().await = fail;
    }

    /// Make every delete fail, leaving the object in place
    pub async fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.write().await = fail;
    }

    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Keys passed to `delete`, in call order
    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("contracts")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let rejected = self
            .fail_writes_when
            .read()
            .await
            .as_ref()
            .map(|predicate| predicate(key))
            .unwrap_or(false);
        if rejected {
            return Err(AppError::Storage {
                message: format!("Write rejected for {}", key),
            });
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.map(str::to_owned),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if *self.fail_deletes.read().await {
            return Err(AppError::Storage {
                message: format!("Delete rejected for {}", key),
            });
        }

        self.objects.write().await.remove(key);
        self.deleted.write().await.push(key.to_string());
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        if *self.fail_signing.read().await {
            return Err(AppError::Storage {
                message: format!("Signing unavailable for {}", key),
            });
        }
        if !self.contains(key).await {
            return Err(AppError::BlobNotFound { key: key.to_string() });
        }

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{}/{}?expires={}", self.bucket, key, expires))
    }
}
