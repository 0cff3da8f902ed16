//! Domain models for billing-service.

mod invoice;
mod payment;

pub use invoice::{
    ClaimStatus, Insurance, Invoice, InvoiceChanges, InvoiceFilter, LineItem, NewInvoice,
    NewLineItem, PaymentOutcome, PaymentStatus,
};
pub use payment::{NewPayment, Payment, PaymentMethod};
