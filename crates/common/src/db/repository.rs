//! Repository pattern for database operations
//!
//! Postgres implementation of the store traits. Simple lookups go through
//! SeaORM entities; joins with aggregates use raw statements.

use crate::db::models::*;
use crate::db::store::{
    ContractFilter, ContractListItem, ContractStore, ContractWithVendor, CustomerField,
    CustomerTotalsRow, InvoiceChanges, InvoiceRow, InvoiceStore, LinkedDocument,
    NewContractDocument, StatusTotals, UserStore,
};
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Shared WHERE clause of the invoice search and count queries
const INVOICE_SEARCH_PREDICATE: &str = r#"
    customers.name ILIKE $1 OR
    customers.email ILIKE $1 OR
    invoices.amount::text ILIKE $1 OR
    invoices.date::text ILIKE $1 OR
    invoices.status ILIKE $1
"#;

const INVOICE_ROW_COLUMNS: &str = r#"
    invoices.id,
    invoices.customer_id,
    invoices.amount,
    invoices.date,
    invoices.status,
    customers.name,
    customers.email,
    customers.image_url
"#;

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Escape LIKE wildcards so user input matches literally
fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn contract_condition(filter: &ContractFilter) -> Condition {
    let mut condition = Condition::all().add(ContractColumn::UserId.eq(filter.user_id));
    if let Some(ref vendor_ids) = filter.vendor_ids {
        condition = condition.add(ContractColumn::VendorId.is_in(vendor_ids.clone()));
    }
    condition
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

#[async_trait]
impl ContractStore for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn find_vendor_ids_by_name(&self, needle: &str) -> Result<Vec<Uuid>> {
        let pattern = like_pattern(&needle.to_lowercase());

        VendorEntity::find()
            .select_only()
            .column(VendorColumn::Id)
            .filter(
                Expr::expr(Func::lower(Expr::col((VendorEntity, VendorColumn::Name))))
                    .like(pattern),
            )
            .into_tuple::<Uuid>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self), fields(user_id = %filter.user_id))]
    async fn list_contracts(
        &self,
        filter: &ContractFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ContractListItem>> {
        let rows = ContractEntity::find()
            .filter(contract_condition(filter))
            .order_by_desc(ContractColumn::UpdatedAt)
            .order_by_desc(ContractColumn::Id)
            .offset(offset)
            .limit(limit)
            .find_also_related(VendorEntity)
            .all(self.read_conn())
            .await?;

        debug!(rows = rows.len(), "Fetched contract page");

        Ok(rows
            .into_iter()
            .map(|(contract, vendor)| ContractListItem::from_parts(contract, vendor))
            .collect())
    }

    async fn count_contracts(&self, filter: &ContractFilter) -> Result<u64> {
        ContractEntity::find()
            .filter(contract_condition(filter))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_contract(&self, user_id: Uuid, id: Uuid) -> Result<Option<ContractWithVendor>> {
        let row = ContractEntity::find_by_id(id)
            .filter(ContractColumn::UserId.eq(user_id))
            .find_also_related(VendorEntity)
            .one(self.read_conn())
            .await?;

        Ok(row.map(|(contract, vendor)| ContractWithVendor { contract, vendor }))
    }

    async fn list_documents(&self, user_id: Uuid, contract_id: Uuid) -> Result<Vec<ContractDocument>> {
        ContractDocumentEntity::find()
            .filter(ContractDocumentColumn::ContractId.eq(contract_id))
            .filter(ContractDocumentColumn::UserId.eq(user_id))
            .order_by_asc(ContractDocumentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self, new), fields(user_id = %new.user_id, file_path = %new.file_path))]
    async fn link_document(&self, new: NewContractDocument) -> Result<LinkedDocument> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let contract = ContractActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            vendor_id: Set(None),
            licensor: Set(new.licensor),
            start_date: Set(new.start_date),
            end_date: Set(None),
            cancel_by: Set(None),
            signed_on: Set(None),
            auto_renew: Set(None),
            payment_terms: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let document = ContractDocumentActiveModel {
            id: Set(Uuid::new_v4()),
            contract_id: Set(contract.id),
            user_id: Set(new.user_id),
            file_path: Set(new.file_path),
            description: Set(new.description),
            document_type_id: Set(new.document_type_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        Ok(LinkedDocument { contract, document })
    }
}

#[async_trait]
impl InvoiceStore for Repository {
    async fn search_invoices(&self, query: &str, offset: u64, limit: u64) -> Result<Vec<InvoiceRow>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM invoices
            JOIN customers ON invoices.customer_id = customers.id
            WHERE {}
            ORDER BY invoices.date DESC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_ROW_COLUMNS, INVOICE_SEARCH_PREDICATE
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![
                like_pattern(query).into(),
                (limit as i64).into(),
                (offset as i64).into(),
            ],
        );

        InvoiceRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn count_invoices_matching(&self, query: &str) -> Result<u64> {
        let sql = format!(
            r#"
            SELECT COUNT(*) AS count
            FROM invoices
            JOIN customers ON invoices.customer_id = customers.id
            WHERE {}
            "#,
            INVOICE_SEARCH_PREDICATE
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![like_pattern(query).into()],
        );

        let count = CountRow::find_by_statement(stmt)
            .one(self.read_conn())
            .await?
            .map(|row| row.count)
            .unwrap_or(0);

        Ok(count.max(0) as u64)
    }

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        InvoiceEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_invoice(&self, changes: InvoiceChanges, date: NaiveDate) -> Result<Invoice> {
        let invoice = InvoiceActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(changes.customer_id),
            amount: Set(changes.amount_cents),
            status: Set(changes.status),
            date: Set(date),
        };

        invoice.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn update_invoice(&self, id: Uuid, changes: InvoiceChanges) -> Result<Option<Invoice>> {
        let Some(existing) = InvoiceEntity::find_by_id(id).one(self.write_conn()).await? else {
            return Ok(None);
        };

        let mut invoice: InvoiceActiveModel = existing.into();
        invoice.customer_id = Set(changes.customer_id);
        invoice.amount = Set(changes.amount_cents);
        invoice.status = Set(changes.status);

        Ok(Some(invoice.update(self.write_conn()).await?))
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool> {
        let result = InvoiceEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_customers(&self) -> Result<Vec<CustomerField>> {
        CustomerEntity::find()
            .select_only()
            .column(CustomerColumn::Id)
            .column(CustomerColumn::Name)
            .order_by_asc(CustomerColumn::Name)
            .into_model::<CustomerField>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn search_customers(&self, query: &str) -> Result<Vec<CustomerTotalsRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                customers.id,
                customers.name,
                customers.email,
                customers.image_url,
                COUNT(invoices.id)::BIGINT AS total_invoices,
                COALESCE(SUM(CASE WHEN invoices.status = 'pending' THEN invoices.amount ELSE 0 END), 0)::BIGINT AS total_pending,
                COALESCE(SUM(CASE WHEN invoices.status = 'paid' THEN invoices.amount ELSE 0 END), 0)::BIGINT AS total_paid
            FROM customers
            LEFT JOIN invoices ON customers.id = invoices.customer_id
            WHERE
                customers.name ILIKE $1 OR
                customers.email ILIKE $1
            GROUP BY customers.id, customers.name, customers.email, customers.image_url
            ORDER BY customers.name ASC
            "#,
            vec![like_pattern(query).into()],
        );

        CustomerTotalsRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn count_invoices(&self) -> Result<u64> {
        InvoiceEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn count_customers(&self) -> Result<u64> {
        CustomerEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn invoice_status_totals(&self) -> Result<StatusTotals> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0)::BIGINT AS paid,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN amount ELSE 0 END), 0)::BIGINT AS pending
            FROM invoices
            "#,
        );

        Ok(StatusTotals::find_by_statement(stmt)
            .one(self.read_conn())
            .await?
            .unwrap_or_default())
    }

    async fn latest_invoices(&self, limit: u64) -> Result<Vec<InvoiceRow>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM invoices
            JOIN customers ON invoices.customer_id = customers.id
            ORDER BY invoices.date DESC
            LIMIT $1
            "#,
            INVOICE_ROW_COLUMNS
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![(limit as i64).into()],
        );

        InvoiceRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn revenue(&self) -> Result<Vec<Revenue>> {
        RevenueEntity::find()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl UserStore for Repository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((UserEntity, UserColumn::Email))))
                    .eq(email.trim().to_lowercase()),
            )
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
