//! API handlers module

pub mod auth;
pub mod contracts;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod invoices;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Rejections are taken as values so `?` turns them into JSON error bodies
pub type JsonBody<T> = Result<Json<T>, JsonRejection>;
pub type QueryParams<T> = Result<Query<T>, QueryRejection>;
pub type PathId = Result<Path<Uuid>, PathRejection>;

/// `?query=&page=` parameters of paginated listings
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub query: String,

    #[serde(default = "first_page")]
    pub page: u64,
}

/// `?query=` parameter of searches and page counts
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub total_pages: u64,
}

fn first_page() -> u64 {
    1
}
