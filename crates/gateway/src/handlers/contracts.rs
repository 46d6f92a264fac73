//! Contract upload and browsing handlers

use axum::{
    extract::{Multipart, State},
    Json,
};
use contractdesk_common::{
    auth::AuthContext,
    contracts::{ContractDetail, DocumentView, UploadFile, UploadReport},
    db::ContractListItem,
    errors::{AppError, Result},
};
use tracing::info;

use super::{PageParams, PagesResponse, PathId, QueryParams, SearchParams};
use crate::AppState;

/// Multipart field carrying the files
const FILES_FIELD: &str = "files";

/// Upload one or more contract documents
pub async fn upload_contracts(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        // Browsers submit an empty part when no file was picked
        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }

        files.push(UploadFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    info!(
        request_id = %auth.request_id,
        user_id = %auth.user_id,
        files = files.len(),
        "Contract upload received"
    );

    let report = state.contracts.upload(auth.user_id, files).await?;
    Ok(Json(report))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidFormat {
        message: e.body_text(),
    }
}

/// One page of the caller's contracts
pub async fn list_contracts(
    State(state): State<AppState>,
    auth: AuthContext,
    params: QueryParams<PageParams>,
) -> Result<Json<Vec<ContractListItem>>> {
    let params = params?.0;
    Ok(Json(
        state
            .contracts
            .list_contracts(auth.user_id, &params.query, params.page)
            .await,
    ))
}

pub async fn contract_pages(
    State(state): State<AppState>,
    auth: AuthContext,
    params: QueryParams<SearchParams>,
) -> Result<Json<PagesResponse>> {
    let total_pages = state.contracts.contract_pages(auth.user_id, &params?.query).await?;
    Ok(Json(PagesResponse { total_pages }))
}

/// Contract with vendor and signed documents
pub async fn get_contract(
    State(state): State<AppState>,
    auth: AuthContext,
    id: PathId,
) -> Result<Json<ContractDetail>> {
    let detail = state.contracts.contract_detail(auth.user_id, id?.0).await?;
    Ok(Json(detail))
}

pub async fn get_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    id: PathId,
) -> Result<Json<Vec<DocumentView>>> {
    let documents = state.contracts.documents_with_signed_urls(auth.user_id, id?.0).await?;
    Ok(Json(documents))
}
