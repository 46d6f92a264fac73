//! Dashboard handlers

use axum::{extract::State, Json};
use contractdesk_common::{
    auth::AuthContext,
    db::models::Revenue,
    errors::Result,
    invoices::{CardData, LatestInvoice},
};

use crate::AppState;

pub async fn cards(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<CardData>> {
    Ok(Json(state.invoices.card_data().await?))
}

pub async fn latest_invoices(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<LatestInvoice>>> {
    Ok(Json(state.invoices.latest_invoices().await?))
}

pub async fn revenue(State(state): State<AppState>, _auth: AuthContext) -> Result<Json<Vec<Revenue>>> {
    Ok(Json(state.invoices.revenue().await?))
}
