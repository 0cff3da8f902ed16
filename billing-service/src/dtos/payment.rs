use crate::models::{NewPayment, Payment, PaymentMethod};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::invoice::InvoiceResponse;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Falls back to the `Idempotency-Key` header when absent.
    #[validate(length(min = 1, max = 128, message = "Idempotency key must be 1-128 characters"))]
    pub idempotency_key: Option<String>,
}

impl RecordPaymentRequest {
    pub fn into_new_payment(self, header_key: Option<String>) -> NewPayment {
        NewPayment {
            amount: self.amount,
            method: self.method,
            reference: self.reference,
            payment_date: self.payment_date,
            notes: self.notes,
            idempotency_key: self.idempotency_key.or(header_key),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            amount: payment.amount,
            method: payment.method,
            reference: payment.reference,
            payment_date: payment.payment_date,
            notes: payment.notes,
            received_at: payment.received_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentResponse {
    pub payment: PaymentResponse,
    pub invoice: InvoiceResponse,
    /// True when the idempotency key matched an earlier payment.
    pub replayed: bool,
}
