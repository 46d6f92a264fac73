//! Contract services
//!
//! `ContractService` owns the two halves of the contracts feature:
//! - the upload pipeline (validation, PDF detail extraction, blob write,
//!   metadata linking, compensation)
//! - the query layer (paged listing, page count, fetch by id, documents with
//!   signed URLs)

mod extract;
mod query;
mod upload;

pub use extract::{extract_pdf_text, parse_details, DocumentDetails};
pub use query::{ContractDetail, DocumentView};
pub use upload::{UploadFile, UploadOutcome, UploadPolicy, UploadReport, UploadStage};

use crate::db::ContractStore;
use crate::storage::BlobStore;
use std::sync::Arc;

/// Where the client goes after a successful upload batch
pub const CONTRACTS_PATH: &str = "/dashboard/contracts";

/// Contract upload and query operations
#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn ContractStore>,
    blobs: Arc<dyn BlobStore>,
    policy: UploadPolicy,
}

impl ContractService {
    pub fn new(store: Arc<dyn ContractStore>, blobs: Arc<dyn BlobStore>, policy: UploadPolicy) -> Self {
        Self { store, blobs, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Check the metadata store is reachable
    pub async fn ping(&self) -> crate::Result<()> {
        self.store.ping().await
    }
}
