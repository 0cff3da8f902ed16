//! Request and response bodies for the billing HTTP API.

mod invoice;
mod payment;
mod report;

pub use invoice::{
    CreateInvoiceRequest, InsuranceRequest, InsuranceResponse, InvoiceResponse,
    LineItemRequest, LineItemResponse, ListInvoicesQuery, UpdateInvoiceRequest,
};
pub use payment::{PaymentResponse, RecordPaymentRequest, RecordPaymentResponse};
pub use report::{BillingSummaryQuery, BillingSummaryResponse};
