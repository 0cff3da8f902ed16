//! Invoice handlers.

use crate::dtos::{CreateInvoiceRequest, InvoiceResponse, ListInvoicesQuery, UpdateInvoiceRequest};
use crate::services::BillingService;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use clinic_core::error::AppError;
use clinic_core::pagination::Paginated;
use validator::Validate;

/// List invoices, newest first.
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Paginated<InvoiceResponse>>, AppError> {
    let filter = query.filter()?;
    let page = query.page_params();

    tracing::debug!(
        page = page.page(),
        limit = page.limit(),
        status = ?filter.status,
        "Listing invoices"
    );

    let (invoices, total) = state.billing.list_invoices(&filter, &page).await?;
    let today = BillingService::today();
    let data = invoices
        .into_iter()
        .map(|invoice| InvoiceResponse::from_invoice(invoice, today))
        .collect();

    Ok(Json(Paginated::new(data, &page, total)))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    let invoice = state.billing.create_invoice(payload.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::from_invoice(invoice, BillingService::today())),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state.billing.get_invoice(&invoice_id).await?;
    Ok(Json(InvoiceResponse::from_invoice(
        invoice,
        BillingService::today(),
    )))
}

/// Update notes, discount or insurance details.
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    payload.validate()?;

    let invoice = state
        .billing
        .update_invoice(&invoice_id, payload.into())
        .await?;

    Ok(Json(InvoiceResponse::from_invoice(
        invoice,
        BillingService::today(),
    )))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.billing.delete_invoice(&invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
