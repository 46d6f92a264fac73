//! Upload pipeline: validate, read PDF details, write the blob, link metadata, compensate

use super::extract::{read_details, DocumentDetails};
use super::{ContractService, CONTRACTS_PATH};
use crate::config::StorageConfig;
use crate::db::NewContractDocument;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::{contract_key, file_extension};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// One file of an upload batch
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Limits applied to every uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Lower-case, without the dot
    pub allowed_extensions: Vec<String>,
    pub max_file_bytes: usize,
    /// Files of one batch processed at the same time
    pub concurrency: usize,
}

impl From<&StorageConfig> for UploadPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_bytes: config.max_file_bytes,
            concurrency: config.upload_concurrency,
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

/// Pipeline step at which a file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Validation,
    BlobWrite,
    Metadata,
}

impl UploadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStage::Validation => "validation",
            UploadStage::BlobWrite => "blob_write",
            UploadStage::Metadata => "metadata",
        }
    }
}

/// Result of one file's pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Stored {
        file_name: String,
        storage_key: String,
        contract_id: Uuid,
        document_id: Uuid,
        sha256: String,
    },
    Failed {
        file_name: String,
        stage: UploadStage,
        error: String,
        /// Whether an orphaned blob was deleted; always false before the blob write
        blob_removed: bool,
    },
}

impl UploadOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored { .. })
    }

    pub fn file_name(&self) -> &str {
        match self {
            UploadOutcome::Stored { file_name, .. } | UploadOutcome::Failed { file_name, .. } => file_name,
        }
    }

    fn failed(file_name: String, stage: UploadStage, err: &AppError, blob_removed: bool) -> Self {
        UploadOutcome::Failed {
            file_name,
            stage,
            error: err.to_string(),
            blob_removed,
        }
    }
}

/// Per-file outcomes in input order
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub results: Vec<UploadOutcome>,
    pub redirect_to: String,
}

impl UploadReport {
    pub fn stored(&self) -> usize {
        self.results.iter().filter(|r| r.is_stored()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.stored()
    }
}

impl UploadPolicy {
    /// Check one file against the policy, returning its extension
    pub fn validate(&self, file: &UploadFile) -> Result<String> {
        if file.bytes.is_empty() {
            return Err(AppError::Validation {
                message: format!("{} is empty", file.file_name),
                field: Some("files".to_string()),
            });
        }

        if file.bytes.len() > self.max_file_bytes {
            return Err(AppError::PayloadTooLarge {
                size: file.bytes.len(),
                limit: self.max_file_bytes,
            });
        }

        let extension = file_extension(&file.file_name).ok_or_else(|| AppError::UnsupportedFileType {
            extension: String::new(),
        })?;

        if !self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Err(AppError::UnsupportedFileType { extension });
        }

        Ok(extension)
    }
}

impl ContractService {
    /// Store every file of a batch and link each to a new contract.
    ///
    /// Files are independent: one failing never stops the others.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload(&self, user_id: Uuid, files: Vec<UploadFile>) -> Result<UploadReport> {
        if files.is_empty() {
            return Err(AppError::EmptyUpload {
                redirect_to: CONTRACTS_PATH.to_string(),
            });
        }

        let results: Vec<UploadOutcome> = stream::iter(files)
            .map(|file| self.store_file(user_id, file))
            .buffered(self.policy.concurrency.max(1))
            .collect()
            .await;

        let report = UploadReport {
            results,
            redirect_to: CONTRACTS_PATH.to_string(),
        };

        info!(stored = report.stored(), failed = report.failed(), "Upload batch processed");

        Ok(report)
    }

    async fn store_file(&self, user_id: Uuid, file: UploadFile) -> UploadOutcome {
        let start = Instant::now();
        let size = file.bytes.len();
        let outcome = self.run_pipeline(user_id, file).await;

        let stage = match &outcome {
            UploadOutcome::Stored { .. } => None,
            UploadOutcome::Failed { stage, .. } => Some(stage.as_str()),
        };
        metrics::record_upload(start.elapsed().as_secs_f64(), size, stage);

        outcome
    }

    async fn run_pipeline(&self, user_id: Uuid, file: UploadFile) -> UploadOutcome {
        let validated = self.policy.validate(&file);
        let UploadFile {
            file_name,
            content_type,
            bytes,
        } = file;

        let extension = match validated {
            Ok(ext) => ext,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Rejected upload file");
                return UploadOutcome::failed(file_name, UploadStage::Validation, &e, false);
            }
        };

        let storage_key = contract_key(user_id, &extension);
        let sha256 = hex::encode(Sha256::digest(&bytes));

        let details = if extension == "pdf" {
            read_details(bytes.clone()).await.unwrap_or_default()
        } else {
            DocumentDetails::default()
        };

        if let Err(e) = self.blobs.put(&storage_key, bytes, content_type.as_deref()).await {
            error!(file = %file_name, key = %storage_key, error = %e, "Blob write failed");
            return UploadOutcome::failed(file_name, UploadStage::BlobWrite, &e, false);
        }

        let new = NewContractDocument {
            user_id,
            file_path: storage_key.clone(),
            description: None,
            document_type_id: None,
            licensor: details.licensor,
            start_date: details.start_date,
        };

        match self.store.link_document(new).await {
            Ok(linked) => {
                info!(
                    file = %file_name,
                    key = %storage_key,
                    contract_id = %linked.contract.id,
                    document_id = %linked.document.id,
                    "Contract document stored"
                );
                UploadOutcome::Stored {
                    file_name,
                    storage_key,
                    contract_id: linked.contract.id,
                    document_id: linked.document.id,
                    sha256,
                }
            }
            Err(e) => {
                error!(file = %file_name, key = %storage_key, error = %e, "Metadata insert failed");
                let blob_removed = self.compensate(&storage_key).await;
                UploadOutcome::failed(file_name, UploadStage::Metadata, &e, blob_removed)
            }
        }
    }

    /// Delete a blob whose metadata never landed
    async fn compensate(&self, storage_key: &str) -> bool {
        match self.blobs.delete(storage_key).await {
            Ok(()) => {
                info!(key = %storage_key, "Orphaned blob removed");
                metrics::record_compensation(true);
                true
            }
            Err(e) => {
                error!(key = %storage_key, error = %e, "Failed to remove orphaned blob");
                metrics::record_compensation(false);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::extract::sample_pdf;
    use crate::db::MemoryStore;
    use crate::storage::MemoryBlobStore;
    use std::sync::Arc;
    use tokio_test::assert_err;

    fn pdf(name: &str) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: b"%PDF-1.7 contract".to_vec(),
        }
    }

    fn service() -> (ContractService, Arc<MemoryStore>, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let service = ContractService::new(store.clone(), blobs.clone(), UploadPolicy::default());
        (service, store, blobs)
    }

    #[tokio::test]
    async fn test_single_upload_links_document_to_new_contract() {
        let (service, store, blobs) = service();
        let user = Uuid::new_v4();

        let report = service.upload(user, vec![pdf("lease.pdf")]).await.unwrap();
        assert_eq!(report.redirect_to, "/dashboard/contracts");

        let UploadOutcome::Stored { storage_key, contract_id, document_id, sha256, .. } = &report.results[0] else {
            panic!("expected stored outcome: {:?}", report.results[0]);
        };

        let contracts = store.contracts().await;
        let documents = store.documents().await;
        assert_eq!(contracts.len(), 1);
        assert_eq!(documents.len(), 1);
        assert_eq!(contracts[0].id, *contract_id);
        assert_eq!(contracts[0].user_id, user);
        assert_eq!(documents[0].id, *document_id);
        assert_eq!(documents[0].contract_id, contracts[0].id);
        assert_eq!(documents[0].file_path, *storage_key);

        assert!(storage_key.starts_with(&format!("{}/contract_", user)));
        assert!(storage_key.ends_with(".pdf"));
        assert!(blobs.contains(storage_key).await);
        assert_eq!(sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let (service, store, _) = service();
        let err = service.upload(Uuid::new_v4(), vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyUpload { ref redirect_to } if redirect_to == "/dashboard/contracts"));
        assert_eq!(err.field(), Some("files"));
        assert!(store.contracts().await.is_empty());
    }

    #[tokio::test]
    async fn test_pdf_details_fill_contract() {
        let (service, store, blobs) = service();
        let file = UploadFile {
            file_name: "license.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: sample_pdf(&["LICENSE AGREEMENT", "Licensor: Acme Media", "Effective Date: 2024-02-01"]),
        };

        let report = service.upload(Uuid::new_v4(), vec![file, pdf("scan.pdf")]).await.unwrap();
        assert_eq!(report.stored(), 2);

        let contracts = store.contracts().await;
        let documents = store.documents().await;
        let contract_of = |name: &str| {
            let UploadOutcome::Stored { contract_id, .. } =
                report.results.iter().find(|r| r.file_name() == name).unwrap()
            else {
                panic!("{} not stored", name);
            };
            contracts.iter().find(|c| c.id == *contract_id).unwrap().clone()
        };

        let license = contract_of("license.pdf");
        assert_eq!(license.licensor.as_deref(), Some("Acme Media"));
        assert_eq!(license.start_date, chrono::NaiveDate::from_ymd_opt(2024, 2, 1));

        // Unreadable PDFs are still stored, just without details
        let scan = contract_of("scan.pdf");
        assert_eq!(scan.licensor, None);
        assert_eq!(scan.start_date, None);
        assert_eq!(documents.len(), 2);
        assert_eq!(blobs.len().await, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_files() {
        let (service, store, blobs) = service();
        blobs.fail_writes_when(|key| key.ends_with(".docx")).await;

        let files = vec![
            pdf("a.pdf"),
            UploadFile { file_name: "b.docx".into(), content_type: None, bytes: vec![1, 2, 3] },
            UploadFile { file_name: "notes.txt".into(), content_type: None, bytes: vec![1] },
            pdf("c.PDF"),
        ];
        let report = service.upload(Uuid::new_v4(), files).await.unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.file_name()).collect();
        assert_eq!(names, vec!["a.pdf", "b.docx", "notes.txt", "c.PDF"]);
        assert_eq!(report.stored(), 2);

        assert!(matches!(
            &report.results[1],
            UploadOutcome::Failed { stage: UploadStage::BlobWrite, blob_removed: false, .. }
        ));
        assert!(matches!(
            &report.results[2],
            UploadOutcome::Failed { stage: UploadStage::Validation, .. }
        ));

        assert_eq!(store.contracts().await.len(), 2);
        assert_eq!(store.documents().await.len(), 2);
        assert_eq!(blobs.len().await, 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_removes_blob() {
        let (service, store, blobs) = service();
        store.fail_links_when(|_| true).await;

        let report = service.upload(Uuid::new_v4(), vec![pdf("lease.pdf")]).await.unwrap();

        let UploadOutcome::Failed { stage, blob_removed, .. } = &report.results[0] else {
            panic!("expected failure");
        };
        assert_eq!(*stage, UploadStage::Metadata);
        assert!(*blob_removed);
        assert!(blobs.is_empty().await);
        assert_eq!(blobs.deleted_keys().await.len(), 1);
        assert!(store.contracts().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_compensation_leaves_blob_and_reports_it() {
        let (service, store, blobs) = service();
        store.fail_links_when(|_| true).await;
        blobs.fail_deletes(true).await;

        let report = service.upload(Uuid::new_v4(), vec![pdf("lease.pdf")]).await.unwrap();

        let UploadOutcome::Failed { stage, blob_removed, .. } = &report.results[0] else {
            panic!("expected failure");
        };
        assert_eq!(*stage, UploadStage::Metadata);
        assert!(!*blob_removed);
        assert_eq!(blobs.len().await, 1);
        assert!(store.contracts().await.is_empty());
        assert!(store.documents().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_failures_never_touch_blob_store() {
        let (service, _, blobs) = service();
        let oversized = UploadFile {
            file_name: "huge.pdf".into(),
            content_type: None,
            bytes: vec![0; service.policy().max_file_bytes + 1],
        };
        let files = vec![
            UploadFile { file_name: "empty.pdf".into(), content_type: None, bytes: vec![] },
            UploadFile { file_name: "README".into(), content_type: None, bytes: vec![1] },
            oversized,
        ];

        let report = service.upload(Uuid::new_v4(), files).await.unwrap();
        assert_eq!(report.failed(), 3);
        assert!(blobs.is_empty().await);
        assert!(blobs.deleted_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_of_one_still_processes_all() {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let policy = UploadPolicy { concurrency: 0, ..UploadPolicy::default() };
        let service = ContractService::new(store.clone(), blobs, policy);

        let files = (0..5).map(|i| pdf(&format!("{}.pdf", i))).collect();
        let report = service.upload(Uuid::new_v4(), files).await.unwrap();
        assert_eq!(report.stored(), 5);
        assert_eq!(store.contracts().await.len(), 5);
    }

    #[test]
    fn test_policy_rejects_unknown_extension() {
        let policy = UploadPolicy::default();
        let file = UploadFile { file_name: "photo.png".into(), content_type: None, bytes: vec![1] };
        assert_err!(policy.validate(&file));
        assert_eq!(policy.validate(&pdf("x.Docx.pdf")).unwrap(), "pdf");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = UploadOutcome::Failed {
            file_name: "a.pdf".into(),
            stage: UploadStage::BlobWrite,
            error: "boom".into(),
            blob_removed: false,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "blob_write");
    }
}
