//! Sign-in handler

use axum::{extract::State, Json};
use contractdesk_common::{
    auth::{LoginForm, TokenResponse},
    errors::Result,
};

use super::JsonBody;
use crate::AppState;

/// Exchange email and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    form: JsonBody<LoginForm>,
) -> Result<Json<TokenResponse>> {
    let Json(form) = form?;
    Ok(Json(state.auth.login(form).await?))
}
