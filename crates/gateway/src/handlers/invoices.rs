//! Invoice handlers

use axum::{extract::State, http::StatusCode, Json};
use contractdesk_common::{
    auth::AuthContext,
    db::{models::Invoice, InvoiceRow},
    errors::Result,
    invoices::{InvoiceForm, InvoiceFormView},
};

use super::{JsonBody, PageParams, PagesResponse, PathId, QueryParams, SearchParams};
use crate::AppState;

pub async fn list_invoices(
    State(state): State<AppState>,
    _auth: AuthContext,
    params: QueryParams<PageParams>,
) -> Result<Json<Vec<InvoiceRow>>> {
    let params = params?.0;
    let invoices = state.invoices.filtered_invoices(&params.query, params.page).await?;
    Ok(Json(invoices))
}

pub async fn invoice_pages(
    State(state): State<AppState>,
    _auth: AuthContext,
    params: QueryParams<SearchParams>,
) -> Result<Json<PagesResponse>> {
    let total_pages = state.invoices.invoice_pages(&params?.query).await?;
    Ok(Json(PagesResponse { total_pages }))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    _auth: AuthContext,
    form: JsonBody<InvoiceForm>,
) -> Result<(StatusCode, Json<Invoice>)> {
    let Json(form) = form?;
    let invoice = state.invoices.create_invoice(form).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Invoice as the edit form shows it, amount in dollars
pub async fn get_invoice(
    State(state): State<AppState>,
    _auth: AuthContext,
    id: PathId,
) -> Result<Json<InvoiceFormView>> {
    let invoice = state.invoices.get_invoice(id?.0).await?;
    Ok(Json(invoice))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    _auth: AuthContext,
    id: PathId,
    form: JsonBody<InvoiceForm>,
) -> Result<Json<Invoice>> {
    let Json(form) = form?;
    let invoice = state.invoices.update_invoice(id?.0, form).await?;
    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    _auth: AuthContext,
    id: PathId,
) -> Result<StatusCode> {
    state.invoices.delete_invoice(id?.0).await?;
    Ok(StatusCode::NO_CONTENT)
}
