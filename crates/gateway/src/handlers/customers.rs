//! Customer handlers

use axum::{extract::State, Json};
use contractdesk_common::{
    auth::AuthContext,
    db::CustomerField,
    errors::Result,
    invoices::CustomerSummary,
};

use super::{QueryParams, SearchParams};
use crate::AppState;

/// Customer picker entries, ordered by name
pub async fn list_customers(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<CustomerField>>> {
    Ok(Json(state.invoices.customers().await?))
}

/// Customers matching `query` with their invoice totals
pub async fn search_customers(
    State(state): State<AppState>,
    _auth: AuthContext,
    params: QueryParams<SearchParams>,
) -> Result<Json<Vec<CustomerSummary>>> {
    Ok(Json(state.invoices.filtered_customers(&params?.query).await?))
}
