//! Invoices, customers and dashboard aggregates
//!
//! Amounts are stored in cents and exposed in dollars on forms and as
//! formatted currency strings on dashboard views.

use crate::db::models::{Invoice, InvoiceStatus, Revenue};
use crate::db::{CustomerField, InvoiceChanges, InvoiceRow, InvoiceStore};
use crate::errors::{AppError, Result};
use crate::{page_offset, total_pages, PAGE_SIZE};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Invoices shown on the dashboard home page
pub const LATEST_INVOICES: u64 = 5;

/// Create/update invoice form. Every field may be absent so that
/// validation, not deserialization, reports what is missing.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct InvoiceForm {
    #[validate(
        required(message = "Please select a customer."),
        length(min = 1, message = "Please select a customer.")
    )]
    pub customer_id: Option<String>,

    /// Dollars
    #[validate(
        required(message = "Please enter an amount greater than $0."),
        range(exclusive_min = 0.0, message = "Please enter an amount greater than $0.")
    )]
    pub amount: Option<f64>,

    pub status: String,
}

impl InvoiceForm {
    /// Validate and convert to storable changes
    pub fn into_changes(self) -> Result<InvoiceChanges> {
        self.validate()?;

        let customer_id = self
            .customer_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id.trim()).ok())
            .ok_or_else(|| AppError::Validation {
                message: "Please select a customer.".to_string(),
                field: Some("customer_id".to_string()),
            })?;

        let amount = self.amount.filter(|amount| amount.is_finite()).ok_or_else(|| AppError::Validation {
            message: "Please enter an amount greater than $0.".to_string(),
            field: Some("amount".to_string()),
        })?;

        let status = self.status.parse::<InvoiceStatus>().map_err(|_| AppError::Validation {
            message: "Please select an invoice status.".to_string(),
            field: Some("status".to_string()),
        })?;

        Ok(InvoiceChanges {
            customer_id,
            amount_cents: dollars_to_cents(amount),
            status,
        })
    }
}

/// Invoice as shown on the edit form, amount in dollars
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceFormView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: f64,
    pub status: InvoiceStatus,
}

impl From<Invoice> for InvoiceFormView {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            customer_id: invoice.customer_id,
            amount: cents_to_dollars(invoice.amount),
            status: invoice.status,
        }
    }
}

/// Customer row with formatted invoice totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub total_invoices: i64,
    pub total_pending: String,
    pub total_paid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestInvoice {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image_url: String,
    pub amount: String,
}

impl From<InvoiceRow> for LatestInvoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            image_url: row.image_url,
            amount: format_currency(row.amount),
        }
    }
}

/// Dashboard summary cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardData {
    pub number_of_invoices: u64,
    pub number_of_customers: u64,
    pub total_paid_invoices: String,
    pub total_pending_invoices: String,
}

/// Invoice, customer and dashboard operations
#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, form))]
    pub async fn create_invoice(&self, form: InvoiceForm) -> Result<Invoice> {
        let changes = form.into_changes()?;
        let invoice = self.store.insert_invoice(changes, Utc::now().date_naive()).await?;
        info!(invoice_id = %invoice.id, "Invoice created");
        Ok(invoice)
    }

    #[instrument(skip(self, form))]
    pub async fn update_invoice(&self, id: Uuid, form: InvoiceForm) -> Result<Invoice> {
        let changes = form.into_changes()?;
        self.store
            .update_invoice(id, changes)
            .await?
            .ok_or_else(|| AppError::InvoiceNotFound { id: id.to_string() })
    }

    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_invoice(id).await? {
            return Err(AppError::InvoiceNotFound { id: id.to_string() });
        }
        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<InvoiceFormView> {
        self.store
            .find_invoice(id)
            .await?
            .map(InvoiceFormView::from)
            .ok_or_else(|| AppError::InvoiceNotFound { id: id.to_string() })
    }

    /// One page of invoices matching `query`, newest first
    #[instrument(skip(self))]
    pub async fn filtered_invoices(&self, query: &str, page: u64) -> Result<Vec<InvoiceRow>> {
        self.store
            .search_invoices(query.trim(), page_offset(page, PAGE_SIZE), PAGE_SIZE)
            .await
    }

    pub async fn invoice_pages(&self, query: &str) -> Result<u64> {
        let count = self.store.count_invoices_matching(query.trim()).await?;
        Ok(total_pages(count, PAGE_SIZE))
    }

    pub async fn customers(&self) -> Result<Vec<CustomerField>> {
        self.store.list_customers().await
    }

    #[instrument(skip(self))]
    pub async fn filtered_customers(&self, query: &str) -> Result<Vec<CustomerSummary>> {
        let rows = self.store.search_customers(query.trim()).await?;
        Ok(rows
            .into_iter()
            .map(|row| CustomerSummary {
                id: row.id,
                name: row.name,
                email: row.email,
                image_url: row.image_url,
                total_invoices: row.total_invoices,
                total_pending: format_currency(row.total_pending),
                total_paid: format_currency(row.total_paid),
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn card_data(&self) -> Result<CardData> {
        let (invoices, customers, totals) = tokio::try_join!(
            self.store.count_invoices(),
            self.store.count_customers(),
            self.store.invoice_status_totals(),
        )?;

        Ok(CardData {
            number_of_invoices: invoices,
            number_of_customers: customers,
            total_paid_invoices: format_currency(totals.paid),
            total_pending_invoices: format_currency(totals.pending),
        })
    }

    pub async fn latest_invoices(&self) -> Result<Vec<LatestInvoice>> {
        let rows = self.store.latest_invoices(LATEST_INVOICES).await?;
        Ok(rows.into_iter().map(LatestInvoice::from).collect())
    }

    pub async fn revenue(&self) -> Result<Vec<Revenue>> {
        self.store.revenue().await
    }
}

pub fn dollars_to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Format cents as US dollars: `123456` becomes `$1,234.56`
pub fn format_currency(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Customer;
    use crate::db::MemoryStore;
    use chrono::NaiveDate;

    fn form(customer_id: Uuid, amount: f64, status: &str) -> InvoiceForm {
        InvoiceForm {
            customer_id: Some(customer_id.to_string()),
            amount: Some(amount),
            status: status.to_string(),
        }
    }

    fn customer(name: &str) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            image_url: format!("/customers/{}.png", name.to_lowercase()),
        }
    }

    fn invoice(customer_id: Uuid, amount: i64, status: InvoiceStatus, day: u32) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            customer_id,
            amount,
            status,
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        }
    }

    async fn seeded() -> (InvoiceService, Arc<MemoryStore>, Customer, Customer) {
        let store = Arc::new(MemoryStore::new());
        let evil = customer("Evil");
        let delba = customer("Delba");
        store.insert_customer(evil.clone()).await;
        store.insert_customer(delba.clone()).await;
        store.insert_invoice_row(invoice(evil.id, 15795, InvoiceStatus::Pending, 1)).await;
        store.insert_invoice_row(invoice(evil.id, 20348, InvoiceStatus::Paid, 2)).await;
        store.insert_invoice_row(invoice(delba.id, 123456, InvoiceStatus::Paid, 3)).await;
        (InvoiceService::new(store.clone()), store, evil, delba)
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0), "$0.00");
        assert_eq!(format_currency(5), "$0.05");
        assert_eq!(format_currency(123456), "$1,234.56");
        assert_eq!(format_currency(100000000), "$1,000,000.00");
        assert_eq!(format_currency(-100), "-$1.00");
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(dollars_to_cents(157.95), 15795);
        assert_eq!(dollars_to_cents(0.1 + 0.2), 30);
        assert_eq!(cents_to_dollars(dollars_to_cents(1234.56)), 1234.56);
    }

    #[test]
    fn test_form_validation() {
        let id = Uuid::new_v4();

        let changes = form(id, 10.5, "paid").into_changes().unwrap();
        assert_eq!(changes.amount_cents, 1050);
        assert_eq!(changes.status, InvoiceStatus::Paid);

        let err = form(id, 0.0, "paid").into_changes().unwrap_err();
        assert_eq!(err.field(), Some("amount"));

        let err = form(id, 1.0, "overdue").into_changes().unwrap_err();
        assert_eq!(err.field(), Some("status"));

        let missing = InvoiceForm { customer_id: None, amount: Some(1.0), status: "paid".into() };
        assert_eq!(missing.into_changes().unwrap_err().field(), Some("customer_id"));

        let blank = InvoiceForm { customer_id: Some(String::new()), ..form(id, 1.0, "paid") };
        assert_eq!(blank.into_changes().unwrap_err().field(), Some("customer_id"));

        let garbled = InvoiceForm { customer_id: Some("not-a-uuid".into()), ..form(id, 1.0, "paid") };
        assert_eq!(garbled.into_changes().unwrap_err().field(), Some("customer_id"));

        let no_amount = InvoiceForm { amount: None, ..form(id, 1.0, "paid") };
        assert_eq!(no_amount.into_changes().unwrap_err().field(), Some("amount"));

        let no_status = InvoiceForm { status: String::new(), ..form(id, 1.0, "paid") };
        assert_eq!(no_status.into_changes().unwrap_err().field(), Some("status"));
    }

    #[test]
    fn test_form_deserializes_partial_body() {
        let form: InvoiceForm = serde_json::from_str(r#"{"status":"paid"}"#).unwrap();
        assert_eq!(form.customer_id, None);
        assert_eq!(form.amount, None);
        assert_eq!(form.into_changes().unwrap_err().status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_create_and_fetch_in_dollars() {
        let (service, _, evil, _) = seeded().await;

        let created = service.create_invoice(form(evil.id, 99.99, "pending")).await.unwrap();
        assert_eq!(created.amount, 9999);
        assert_eq!(created.date, Utc::now().date_naive());

        let view = service.get_invoice(created.id).await.unwrap();
        assert_eq!(view.amount, 99.99);
        assert_eq!(view.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_are_not_found() {
        let (service, _, evil, _) = seeded().await;
        let missing = Uuid::new_v4();

        let err = service.update_invoice(missing, form(evil.id, 1.0, "paid")).await.unwrap_err();
        assert!(matches!(err, AppError::InvoiceNotFound { .. }));
        assert!(matches!(
            service.delete_invoice(missing).await.unwrap_err(),
            AppError::InvoiceNotFound { .. }
        ));
        assert!(matches!(
            service.get_invoice(missing).await.unwrap_err(),
            AppError::InvoiceNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let (service, store, evil, delba) = seeded().await;
        let created = service.create_invoice(form(evil.id, 5.0, "pending")).await.unwrap();

        let updated = service
            .update_invoice(created.id, form(delba.id, 7.25, "paid"))
            .await
            .unwrap();
        assert_eq!(updated.customer_id, delba.id);
        assert_eq!(updated.amount, 725);
        assert_eq!(updated.status, InvoiceStatus::Paid);

        service.delete_invoice(created.id).await.unwrap();
        assert!(store.find_invoice(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filtered_invoices_and_pages() {
        let (service, _, _, _) = seeded().await;

        let all = service.filtered_invoices("", 1).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].date >= w[1].date));

        let evil = service.filtered_invoices("EVIL", 1).await.unwrap();
        assert_eq!(evil.len(), 2);
        assert_eq!(service.filtered_invoices("paid", 1).await.unwrap().len(), 2);
        assert_eq!(service.invoice_pages("").await.unwrap(), 1);
        assert_eq!(service.invoice_pages("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_card_data() {
        let (service, _, _, _) = seeded().await;
        let cards = service.card_data().await.unwrap();

        assert_eq!(cards.number_of_invoices, 3);
        assert_eq!(cards.number_of_customers, 2);
        assert_eq!(cards.total_paid_invoices, "$1,438.04");
        assert_eq!(cards.total_pending_invoices, "$157.95");
    }

    #[tokio::test]
    async fn test_card_data_propagates_backend_errors() {
        let (service, store, _, _) = seeded().await;
        store.set_offline(true);
        assert!(service.card_data().await.is_err());
    }

    #[tokio::test]
    async fn test_latest_and_customers() {
        let (service, _, _, delba) = seeded().await;

        let latest = service.latest_invoices().await.unwrap();
        assert_eq!(latest[0].name, "Delba");
        assert_eq!(latest[0].amount, "$1,234.56");

        let pickers = service.customers().await.unwrap();
        assert_eq!(pickers[0].name, "Delba");

        let summaries = service.filtered_customers("delba@").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, delba.id);
        assert_eq!(summaries[0].total_invoices, 1);
        assert_eq!(summaries[0].total_paid, "$1,234.56");
        assert_eq!(summaries[0].total_pending, "$0.00");
    }
}
