//! Payment handlers.

use crate::dtos::{InvoiceResponse, PaymentResponse, RecordPaymentRequest, RecordPaymentResponse};
use crate::services::BillingService;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use clinic_core::error::AppError;
use validator::Validate;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Record a payment against an invoice.
///
/// Responds `201` for a new payment and `200` when the idempotency key
/// replays an earlier one.
pub async fn record_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    payload.validate()?;

    let header_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    if header_key
        .as_ref()
        .is_some_and(|key| key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN)
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Idempotency key must be 1-128 characters"
        )));
    }

    let (invoice, payment, replayed) = state
        .billing
        .record_payment(&invoice_id, payload.into_new_payment(header_key))
        .await?;

    let status = if replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(RecordPaymentResponse {
            payment: payment.into(),
            invoice: InvoiceResponse::from_invoice(invoice, BillingService::today()),
            replayed,
        }),
    ))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state.billing.list_payments(&invoice_id).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}
