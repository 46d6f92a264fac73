//! Contract query layer and signed document links

use super::ContractService;
use crate::db::models::ContractDocument;
use crate::db::{ContractFilter, ContractListItem, ContractWithVendor};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::SIGNED_URL_TTL;
use crate::{page_offset, total_pages, PAGE_SIZE};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// A document with a temporary retrieval link. `signed_url` is null when
/// no link could be minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: ContractDocument,
    pub signed_url: Option<String>,
}

/// Contract detail page payload
#[derive(Debug, Clone, Serialize)]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: ContractWithVendor,
    pub documents: Vec<DocumentView>,
}

impl ContractService {
    /// Resolve the listing filter. `None` means the query matched no vendor.
    async fn contract_filter(&self, user_id: Uuid, query: &str) -> Result<Option<ContractFilter>> {
        let query = query.trim();
        let mut filter = ContractFilter::for_user(user_id);
        if query.is_empty() {
            return Ok(Some(filter));
        }

        let vendor_ids = self.store.find_vendor_ids_by_name(query).await?;
        if vendor_ids.is_empty() {
            return Ok(None);
        }
        filter.vendor_ids = Some(vendor_ids);
        Ok(Some(filter))
    }

    /// One page of the user's contracts, most recently updated first.
    ///
    /// Backend failures degrade to an empty page.
    #[instrument(skip(self))]
    pub async fn list_contracts(&self, user_id: Uuid, query: &str, page: u64) -> Vec<ContractListItem> {
        match self.try_list_contracts(user_id, query, page).await {
            Ok(contracts) => contracts,
            Err(e) => {
                error!(error = %e, "Failed to list contracts");
                metrics::record_degraded_query("contracts");
                Vec::new()
            }
        }
    }

    async fn try_list_contracts(&self, user_id: Uuid, query: &str, page: u64) -> Result<Vec<ContractListItem>> {
        let Some(filter) = self.contract_filter(user_id, query).await? else {
            return Ok(Vec::new());
        };
        self.store
            .list_contracts(&filter, page_offset(page, PAGE_SIZE), PAGE_SIZE)
            .await
    }

    /// Number of pages the listing has for `query`
    #[instrument(skip(self))]
    pub async fn contract_pages(&self, user_id: Uuid, query: &str) -> Result<u64> {
        let count = match self.contract_filter(user_id, query).await {
            Ok(Some(filter)) => self.store.count_contracts(&filter).await,
            Ok(None) => Ok(0),
            Err(e) => Err(e),
        }
        .map_err(|e| {
            error!(error = %e, "Failed to count contracts");
            AppError::Internal {
                message: "Failed to fetch total number of contracts".to_string(),
            }
        })?;

        Ok(total_pages(count, PAGE_SIZE))
    }

    /// A contract owned by the user, with its vendor
    #[instrument(skip(self))]
    pub async fn get_contract(&self, user_id: Uuid, id: Uuid) -> Result<ContractWithVendor> {
        match self.store.find_contract(user_id, id).await {
            Ok(Some(contract)) => Ok(contract),
            Ok(None) => Err(AppError::ContractNotFound { id: id.to_string() }),
            Err(e) => {
                error!(contract_id = %id, error = %e, "Failed to fetch contract");
                Err(AppError::Internal {
                    message: "Failed to fetch contract".to_string(),
                })
            }
        }
    }

    /// Documents of a contract, each with a signed URL
    #[instrument(skip(self))]
    pub async fn documents_with_signed_urls(&self, user_id: Uuid, contract_id: Uuid) -> Result<Vec<DocumentView>> {
        let documents = self
            .store
            .list_documents(user_id, contract_id)
            .await
            .map_err(|e| {
                error!(contract_id = %contract_id, error = %e, "Failed to fetch contract documents");
                AppError::Internal {
                    message: "Failed to fetch contract documents".to_string(),
                }
            })?;

        Ok(join_all(documents.into_iter().map(|document| self.sign_document(document))).await)
    }

    /// Contract, vendor and signed documents in one payload
    pub async fn contract_detail(&self, user_id: Uuid, id: Uuid) -> Result<ContractDetail> {
        let contract = self.get_contract(user_id, id).await?;
        let documents = self.documents_with_signed_urls(user_id, id).await?;
        Ok(ContractDetail { contract, documents })
    }

    /// Temporary retrieval link for a stored file
    pub async fn signed_url(&self, file_path: &str) -> Result<String> {
        self.blobs.signed_url(file_path, SIGNED_URL_TTL).await
    }

    async fn sign_document(&self, document: ContractDocument) -> DocumentView {
        let signed_url = match self.signed_url(&document.file_path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(path = %document.file_path, error = %e, "Could not sign document URL");
                metrics::record_signed_url_failure();
                None
            }
        };
        DocumentView { document, signed_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{UploadFile, UploadPolicy};
    use crate::db::models::{Contract, Vendor};
    use crate::db::MemoryStore;
    use crate::storage::MemoryBlobStore;
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
    use std::sync::Arc;

    fn at(minutes: i64) -> DateTime<FixedOffset> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        (base + Duration::minutes(minutes)).into()
    }

    fn contract(user_id: Uuid, vendor_id: Option<Uuid>, minutes: i64) -> Contract {
        Contract {
            id: Uuid::new_v4(),
            user_id,
            vendor_id,
            licensor: None,
            start_date: None,
            end_date: None,
            cancel_by: None,
            signed_on: None,
            auto_renew: Some(true),
            payment_terms: None,
            created_at: at(0),
            updated_at: at(minutes),
        }
    }

    fn vendor(name: &str) -> Vendor {
        Vendor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            phone: None,
            address: None,
        }
    }

    fn service() -> (ContractService, Arc<MemoryStore>, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let service = ContractService::new(store.clone(), blobs.clone(), UploadPolicy::default());
        (service, store, blobs)
    }

    #[tokio::test]
    async fn test_first_page_is_newest_six() {
        let (service, store, _) = service();
        let user = Uuid::new_v4();
        for minutes in 0..13 {
            store.insert_contract(contract(user, None, minutes)).await;
        }
        store.insert_contract(contract(Uuid::new_v4(), None, 100)).await;

        let page = service.list_contracts(user, "", 1).await;
        assert_eq!(page.len(), 6);
        assert_eq!(page[0].updated_at, at(12));
        assert!(page.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));

        assert_eq!(service.list_contracts(user, "", 3).await.len(), 1);
        assert_eq!(service.list_contracts(user, "", 0).await, page);
        assert_eq!(service.contract_pages(user, "").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_vendor_query_filters_list_and_pages() {
        let (service, store, _) = service();
        let user = Uuid::new_v4();
        let acme = vendor("Acme Hosting");
        let globex = vendor("Globex");
        store.insert_contract(contract(user, Some(acme.id), 1)).await;
        store.insert_contract(contract(user, Some(globex.id), 2)).await;
        store.insert_contract(contract(user, None, 3)).await;
        store.insert_vendor(acme.clone()).await;
        store.insert_vendor(globex).await;

        let page = service.list_contracts(user, "  acme ", 1).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].vendor_name.as_deref(), Some("Acme Hosting"));
        assert_eq!(service.contract_pages(user, "ACME").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_query_is_empty_not_error() {
        let (service, store, _) = service();
        let user = Uuid::new_v4();
        store.insert_contract(contract(user, None, 1)).await;

        assert!(service.list_contracts(user, "initech", 1).await.is_empty());
        assert_eq!(service.contract_pages(user, "initech").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_list_but_not_pages() {
        let (service, store, _) = service();
        store.set_offline(true);

        assert!(service.list_contracts(Uuid::new_v4(), "", 1).await.is_empty());
        let err = service.contract_pages(Uuid::new_v4(), "").await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_get_contract_not_found() {
        let (service, store, _) = service();
        let owner = Uuid::new_v4();
        let existing = contract(owner, None, 1);
        store.insert_contract(existing.clone()).await;

        let missing = service.get_contract(owner, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(missing.status_code(), axum::http::StatusCode::NOT_FOUND);

        let foreign = service.get_contract(Uuid::new_v4(), existing.id).await.unwrap_err();
        assert!(matches!(foreign, AppError::ContractNotFound { .. }));

        assert_eq!(service.get_contract(owner, existing.id).await.unwrap().contract, existing);
    }

    #[tokio::test]
    async fn test_get_contract_backend_error_is_internal() {
        let (service, store, _) = service();
        store.set_offline(true);
        let err = service.get_contract(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_documents_get_signed_urls() {
        let (service, store, _) = service();
        let user = Uuid::new_v4();
        let file = UploadFile {
            file_name: "msa.pdf".into(),
            content_type: None,
            bytes: b"%PDF".to_vec(),
        };
        let report = service.upload(user, vec![file]).await.unwrap();
        let contract_id = store.contracts().await[0].id;
        assert_eq!(report.stored(), 1);

        let detail = service.contract_detail(user, contract_id).await.unwrap();
        assert_eq!(detail.documents.len(), 1);
        let url = detail.documents[0].signed_url.as_deref().unwrap();
        assert!(url.contains(&detail.documents[0].document.file_path));
    }

    #[tokio::test]
    async fn test_missing_blob_yields_null_url() {
        let (service, store, _) = service();
        let user = Uuid::new_v4();
        let existing = contract(user, None, 1);
        store.insert_contract(existing.clone()).await;
        store
            .insert_document(ContractDocument {
                id: Uuid::new_v4(),
                contract_id: existing.id,
                user_id: user,
                file_path: format!("{}/contract_0.5.pdf", user),
                description: None,
                document_type_id: None,
                created_at: at(1),
                updated_at: at(1),
            })
            .await;

        let documents = service.documents_with_signed_urls(user, existing.id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].signed_url, None);

        let json = serde_json::to_value(&documents[0]).unwrap();
        assert!(json["signed_url"].is_null());
        assert_eq!(json["contract_id"], existing.id.to_string());
    }

    #[tokio::test]
    async fn test_no_documents_is_empty_list() {
        let (service, _, _) = service();
        let documents = service
            .documents_with_signed_urls(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn test_signing_outage_keeps_documents() {
        let (service, store, blobs) = service();
        let user = Uuid::new_v4();
        let file = UploadFile { file_name: "a.doc".into(), content_type: None, bytes: vec![7] };
        service.upload(user, vec![file]).await.unwrap();
        blobs.fail_signing(true).await;

        let contract_id = store.contracts().await[0].id;
        let documents = service.documents_with_signed_urls(user, contract_id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].signed_url.is_none());
    }
}
