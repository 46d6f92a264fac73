//! In-process store
//!
//! Mirrors the Postgres repository semantics closely enough to run the
//! gateway without a database and to exercise the services in tests.
//! Failures can be injected to simulate an unreachable or rejecting backend.

use crate::db::models::{
    Contract, ContractDocument, Customer, Invoice, InvoiceStatus, Revenue, User, Vendor,
};
use crate::db::store::{
    ContractFilter, ContractListItem, ContractStore, ContractWithVendor, CustomerField,
    CustomerTotalsRow, InvoiceChanges, InvoiceRow, InvoiceStore, LinkedDocument,
    NewContractDocument, StatusTotals, UserStore,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type LinkPredicate = Arc<dyn Fn(&NewContractDocument) -> bool + Send + Sync>;

#[derive(Default)]
struct Tables {
    vendors: Vec<Vendor>,
    contracts: Vec<Contract>,
    documents: Vec<ContractDocument>,
    customers: Vec<Customer>,
    invoices: Vec<Invoice>,
    revenue: Vec<Revenue>,
    users: Vec<User>,
}

/// In-memory implementation of the store traits
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
    fail_link_when: RwLock<Option<LinkPredicate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject `link_document` calls matching `predicate`; nothing is written for them
    pub async fn fail_links_when<F>(&self, predicate: F)
    where
        F: Fn(&NewContractDocument) -> bool + Send + Sync + 'static,
    {
        *self.fail_link_when.write().await = Some(Arc::new(predicate));
    }

    pub async fn insert_vendor(&self, vendor: Vendor) {
        self.tables.write().await.vendors.push(vendor);
    }

    pub async fn insert_contract(&self, contract: Contract) {
        self.tables.write().await.contracts.push(contract);
    }

    pub async fn insert_document(&self, document: ContractDocument) {
        self.tables.write().await.documents.push(document);
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.tables.write().await.customers.push(customer);
    }

    pub async fn insert_invoice_row(&self, invoice: Invoice) {
        self.tables.write().await.invoices.push(invoice);
    }

    pub async fn insert_revenue(&self, revenue: Revenue) {
        self.tables.write().await.revenue.push(revenue);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.push(user);
    }

    /// Snapshot of all contract rows
    pub async fn contracts(&self) -> Vec<Contract> {
        self.tables.read().await.contracts.clone()
    }

    /// Snapshot of all document rows
    pub async fn documents(&self) -> Vec<ContractDocument> {
        self.tables.read().await.documents.clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseConnection {
                message: "memory store is offline".to_string(),
            });
        }
        Ok(())
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn matches_filter(contract: &Contract, filter: &ContractFilter) -> bool {
    contract.user_id == filter.user_id
        && filter.vendor_ids.as_ref().map_or(true, |ids| {
            contract.vendor_id.is_some_and(|vendor_id| ids.contains(&vendor_id))
        })
}

fn invoice_row(invoice: &Invoice, customers: &[Customer]) -> Option<InvoiceRow> {
    let customer = customers.iter().find(|c| c.id == invoice.customer_id)?;
    Some(InvoiceRow {
        id: invoice.id,
        customer_id: invoice.customer_id,
        amount: invoice.amount,
        date: invoice.date,
        status: invoice.status,
        name: customer.name.clone(),
        email: customer.email.clone(),
        image_url: customer.image_url.clone(),
    })
}

fn invoice_matches(row: &InvoiceRow, needle_lower: &str) -> bool {
    contains_ignore_case(&row.name, needle_lower)
        || contains_ignore_case(&row.email, needle_lower)
        || row.amount.to_string().contains(needle_lower)
        || row.date.to_string().contains(needle_lower)
        || row.status.as_str().contains(needle_lower)
}

/// Joined invoice rows matching `query`, newest first
fn matching_invoices(tables: &Tables, query: &str) -> Vec<InvoiceRow> {
    let needle = query.to_lowercase();
    let mut rows: Vec<InvoiceRow> = tables
        .invoices
        .iter()
        .filter_map(|invoice| invoice_row(invoice, &tables.customers))
        .filter(|row| invoice_matches(row, &needle))
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn find_vendor_ids_by_name(&self, needle: &str) -> Result<Vec<Uuid>> {
        self.check_online()?;
        let needle = needle.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .vendors
            .iter()
            .filter(|v| contains_ignore_case(&v.name, &needle))
            .map(|v| v.id)
            .collect())
    }

    async fn list_contracts(
        &self,
        filter: &ContractFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ContractListItem>> {
        self.check_online()?;
        let tables = self.tables.read().await;

        let mut contracts: Vec<&Contract> = tables
            .contracts
            .iter()
            .filter(|c| matches_filter(c, filter))
            .collect();
        contracts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));

        Ok(contracts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|contract| {
                let vendor = contract
                    .vendor_id
                    .and_then(|id| tables.vendors.iter().find(|v| v.id == id).cloned());
                ContractListItem::from_parts(contract.clone(), vendor)
            })
            .collect())
    }

    async fn count_contracts(&self, filter: &ContractFilter) -> Result<u64> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .contracts
            .iter()
            .filter(|c| matches_filter(c, filter))
            .count() as u64)
    }

    async fn find_contract(&self, user_id: Uuid, id: Uuid) -> Result<Option<ContractWithVendor>> {
        self.check_online()?;
        let tables = self.tables.read().await;

        Ok(tables
            .contracts
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .map(|contract| ContractWithVendor {
                contract: contract.clone(),
                vendor: contract
                    .vendor_id
                    .and_then(|vid| tables.vendors.iter().find(|v| v.id == vid).cloned()),
            }))
    }

    async fn list_documents(&self, user_id: Uuid, contract_id: Uuid) -> Result<Vec<ContractDocument>> {
        self.check_online()?;
        let mut documents: Vec<ContractDocument> = self
            .tables
            .read()
            .await
            .documents
            .iter()
            .filter(|d| d.contract_id == contract_id && d.user_id == user_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(documents)
    }

    async fn link_document(&self, new: NewContractDocument) -> Result<LinkedDocument> {
        self.check_online()?;

        if let Some(predicate) = self.fail_link_when.read().await.as_ref() {
            if predicate(&new) {
                return Err(AppError::DatabaseConnection {
                    message: format!("insert rejected for {}", new.file_path),
                });
            }
        }

        let now = DateTime::<FixedOffset>::from(Utc::now());
        let contract = Contract {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            vendor_id: None,
            licensor: new.licensor,
            start_date: new.start_date,
            end_date: None,
            cancel_by: None,
            signed_on: None,
            auto_renew: None,
            payment_terms: None,
            created_at: now,
            updated_at: now,
        };
        let document = ContractDocument {
            id: Uuid::new_v4(),
            contract_id: contract.id,
            user_id: new.user_id,
            file_path: new.file_path,
            description: new.description,
            document_type_id: new.document_type_id,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.contracts.push(contract.clone());
        tables.documents.push(document.clone());

        Ok(LinkedDocument { contract, document })
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn search_invoices(&self, query: &str, offset: u64, limit: u64) -> Result<Vec<InvoiceRow>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(matching_invoices(&tables, query)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_invoices_matching(&self, query: &str) -> Result<u64> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(matching_invoices(&tables, query).len() as u64)
    }

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        self.check_online()?;
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn insert_invoice(&self, changes: InvoiceChanges, date: NaiveDate) -> Result<Invoice> {
        self.check_online()?;
        let invoice = Invoice {
            id: Uuid::new_v4(),
            customer_id: changes.customer_id,
            amount: changes.amount_cents,
            status: changes.status,
            date,
        };
        self.tables.write().await.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn update_invoice(&self, id: Uuid, changes: InvoiceChanges) -> Result<Option<Invoice>> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        Ok(tables.invoices.iter_mut().find(|i| i.id == id).map(|invoice| {
            invoice.customer_id = changes.customer_id;
            invoice.amount = changes.amount_cents;
            invoice.status = changes.status;
            invoice.clone()
        }))
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let before = tables.invoices.len();
        tables.invoices.retain(|i| i.id != id);
        Ok(tables.invoices.len() < before)
    }

    async fn list_customers(&self) -> Result<Vec<CustomerField>> {
        self.check_online()?;
        let mut customers: Vec<CustomerField> = self
            .tables
            .read()
            .await
            .customers
            .iter()
            .map(|c| CustomerField { id: c.id, name: c.name.clone() })
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn search_customers(&self, query: &str) -> Result<Vec<CustomerTotalsRow>> {
        self.check_online()?;
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;

        let mut rows: Vec<CustomerTotalsRow> = tables
            .customers
            .iter()
            .filter(|c| contains_ignore_case(&c.name, &needle) || contains_ignore_case(&c.email, &needle))
            .map(|customer| {
                let invoices: Vec<&Invoice> = tables
                    .invoices
                    .iter()
                    .filter(|i| i.customer_id == customer.id)
                    .collect();
                let total_for = |status: InvoiceStatus| -> i64 {
                    invoices.iter().filter(|i| i.status == status).map(|i| i.amount).sum()
                };
                CustomerTotalsRow {
                    id: customer.id,
                    name: customer.name.clone(),
                    email: customer.email.clone(),
                    image_url: customer.image_url.clone(),
                    total_invoices: invoices.len() as i64,
                    total_pending: total_for(InvoiceStatus::Pending),
                    total_paid: total_for(InvoiceStatus::Paid),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn count_invoices(&self) -> Result<u64> {
        self.check_online()?;
        Ok(self.tables.read().await.invoices.len() as u64)
    }

    async fn count_customers(&self) -> Result<u64> {
        self.check_online()?;
        Ok(self.tables.read().await.customers.len() as u64)
    }

    async fn invoice_status_totals(&self) -> Result<StatusTotals> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.invoices.iter().fold(StatusTotals::default(), |mut totals, invoice| {
            match invoice.status {
                InvoiceStatus::Paid => totals.paid += invoice.amount,
                InvoiceStatus::Pending => totals.pending += invoice.amount,
            }
            totals
        }))
    }

    async fn latest_invoices(&self, limit: u64) -> Result<Vec<InvoiceRow>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(matching_invoices(&tables, "")
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn revenue(&self) -> Result<Vec<Revenue>> {
        self.check_online()?;
        Ok(self.tables.read().await.revenue.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.check_online()?;
        let email = email.trim().to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }
}
