pub mod health;
pub mod invoices;
pub mod payments;
pub mod reports;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{create_invoice, delete_invoice, get_invoice, list_invoices, update_invoice};
pub use payments::{list_payments, record_payment};
pub use reports::billing_summary;
