//! ContractDesk Common Library
//!
//! Shared code for the ContractDesk services including:
//! - Database models, store traits and the Postgres repository
//! - Blob storage (S3 and in-memory backends) and signed URLs
//! - Contract upload and query services
//! - Invoice, customer and dashboard services
//! - Error types, configuration, authentication and metrics

pub mod auth;
pub mod config;
pub mod contracts;
pub mod db;
pub mod errors;
pub mod invoices;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use contracts::ContractService;
pub use db::{ContractStore, InvoiceStore, Repository, UserStore};
pub use errors::{AppError, Result};
pub use invoices::InvoiceService;
pub use storage::BlobStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rows returned per page by every paginated listing
pub const PAGE_SIZE: u64 = 6;

/// Number of pages needed to show `count` rows
pub fn total_pages(count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Offset of the first row of a 1-based page. Pages below 1 are treated as 1.
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.max(1).saturating_sub(1).saturating_mul(page_size)
}
