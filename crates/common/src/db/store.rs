//! Storage traits used by the services
//!
//! `Repository` implements them against Postgres; `MemoryStore` implements
//! them in-process for local runs and tests.

use crate::db::models::{Contract, ContractDocument, Invoice, InvoiceStatus, Revenue, User, Vendor};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filter shared by the contract list and count queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFilter {
    pub user_id: Uuid,
    /// Restrict to these vendors; `None` means no vendor restriction
    pub vendor_ids: Option<Vec<Uuid>>,
}

impl ContractFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { user_id, vendor_ids: None }
    }
}

/// Row of the contracts table view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractListItem {
    pub id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub vendor_name: Option<String>,
    pub licensor: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub cancel_by: Option<NaiveDate>,
    pub auto_renew: Option<bool>,
    pub updated_at: DateTime<FixedOffset>,
}

impl ContractListItem {
    pub fn from_parts(contract: Contract, vendor: Option<Vendor>) -> Self {
        Self {
            id: contract.id,
            vendor_id: contract.vendor_id,
            vendor_name: vendor.map(|v| v.name),
            licensor: contract.licensor,
            start_date: contract.start_date,
            end_date: contract.end_date,
            cancel_by: contract.cancel_by,
            auto_renew: contract.auto_renew,
            updated_at: contract.updated_at,
        }
    }
}

/// A contract with its vendor fully expanded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractWithVendor {
    #[serde(flatten)]
    pub contract: Contract,
    pub vendor: Option<Vendor>,
}

/// Input of the metadata linker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContractDocument {
    pub user_id: Uuid,
    pub file_path: String,
    pub description: Option<String>,
    pub document_type_id: Option<i32>,
    /// Contract fields read from the document itself
    pub licensor: Option<String>,
    pub start_date: Option<NaiveDate>,
}

/// Contract and document rows created together by the linker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedDocument {
    pub contract: Contract,
    pub document: ContractDocument,
}

/// Contract persistence
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Check connectivity
    async fn ping(&self) -> Result<()>;

    /// Ids of vendors whose name contains `needle`, ignoring case
    async fn find_vendor_ids_by_name(&self, needle: &str) -> Result<Vec<Uuid>>;

    /// Contracts matching `filter`, most recently updated first
    async fn list_contracts(
        &self,
        filter: &ContractFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ContractListItem>>;

    /// Number of contracts matching `filter`
    async fn count_contracts(&self, filter: &ContractFilter) -> Result<u64>;

    /// A contract owned by `user_id`, with its vendor
    async fn find_contract(&self, user_id: Uuid, id: Uuid) -> Result<Option<ContractWithVendor>>;

    /// Documents of a contract owned by `user_id`
    async fn list_documents(&self, user_id: Uuid, contract_id: Uuid) -> Result<Vec<ContractDocument>>;

    /// Insert a contract row, then a document row pointing at it, atomically
    async fn link_document(&self, new: NewContractDocument) -> Result<LinkedDocument>;
}

/// Sign-in accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The user registered under `email`, compared case-insensitively
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Invoice joined with its customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Cents
    pub amount: i64,
    pub date: NaiveDate,
    pub status: InvoiceStatus,
    pub name: String,
    pub email: String,
    pub image_url: String,
}

/// Customer with aggregated invoice totals in cents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct CustomerTotalsRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub total_invoices: i64,
    pub total_pending: i64,
    pub total_paid: i64,
}

/// Minimal customer projection for pickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct CustomerField {
    pub id: Uuid,
    pub name: String,
}

/// Sums of invoice amounts per status, in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct StatusTotals {
    pub paid: i64,
    pub pending: i64,
}

/// Validated invoice fields, amount already in cents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceChanges {
    pub customer_id: Uuid,
    pub amount_cents: i64,
    pub status: InvoiceStatus,
}

/// Invoice, customer and revenue persistence
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Invoices whose customer name, email, amount, date or status contain `query`
    async fn search_invoices(&self, query: &str, offset: u64, limit: u64) -> Result<Vec<InvoiceRow>>;

    async fn count_invoices_matching(&self, query: &str) -> Result<u64>;

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>>;

    async fn insert_invoice(&self, changes: InvoiceChanges, date: NaiveDate) -> Result<Invoice>;

    /// `None` when no invoice has this id
    async fn update_invoice(&self, id: Uuid, changes: InvoiceChanges) -> Result<Option<Invoice>>;

    /// `false` when no invoice has this id
    async fn delete_invoice(&self, id: Uuid) -> Result<bool>;

    /// All customers ordered by name
    async fn list_customers(&self) -> Result<Vec<CustomerField>>;

    /// Customers whose name or email contain `query`, with totals
    async fn search_customers(&self, query: &str) -> Result<Vec<CustomerTotalsRow>>;

    async fn count_invoices(&self) -> Result<u64>;

    async fn count_customers(&self) -> Result<u64>;

    async fn invoice_status_totals(&self) -> Result<StatusTotals>;

    /// Most recent invoices first
    async fn latest_invoices(&self, limit: u64) -> Result<Vec<InvoiceRow>>;

    async fn revenue(&self) -> Result<Vec<Revenue>>;
}
