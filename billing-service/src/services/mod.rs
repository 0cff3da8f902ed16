//! Services module for billing-service.

pub mod billing;
pub mod calculator;
pub mod metrics;
pub mod reports;
pub mod store;

pub use billing::BillingService;
pub use metrics::{get_metrics, init_metrics};
pub use reports::BillingSummary;
pub use store::{InvoiceStore, MemoryInvoiceStore, MongoInvoiceStore};
