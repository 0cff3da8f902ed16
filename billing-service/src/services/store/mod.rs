//! Invoice persistence.

mod memory;
mod mongo;

pub use memory::MemoryInvoiceStore;
pub use mongo::MongoInvoiceStore;

use crate::models::{Invoice, InvoiceFilter};
use async_trait::async_trait;
use chrono::NaiveDate;
use clinic_core::error::AppError;

/// Storage for invoice documents.
///
/// Writes to existing invoices are compare-and-swap on `version`: they succeed
/// only if the stored document still carries `expected_version`.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<Invoice>, AppError>;

    /// Replace the stored invoice if its version still equals `expected_version`.
    /// Returns `false` when another writer got there first.
    async fn replace(&self, invoice: &Invoice, expected_version: i64) -> Result<bool, AppError>;

    /// Delete the invoice if its version still equals `expected_version`.
    async fn delete(&self, id: &str, expected_version: i64) -> Result<bool, AppError>;

    /// One page of matching invoices, newest first, plus the total match count.
    async fn list(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), AppError>;

    /// Every matching invoice, for aggregation.
    async fn scan(&self, filter: &InvoiceFilter, today: NaiveDate)
        -> Result<Vec<Invoice>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
