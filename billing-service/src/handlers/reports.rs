use crate::dtos::{BillingSummaryQuery, BillingSummaryResponse};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use clinic_core::error::AppError;

/// Totals over invoices created in the requested range.
pub async fn billing_summary(
    State(state): State<AppState>,
    Query(query): Query<BillingSummaryQuery>,
) -> Result<Json<BillingSummaryResponse>, AppError> {
    let filter = query.filter()?;
    let summary = state.billing.billing_summary(&filter).await?;

    tracing::debug!(
        invoice_count = summary.invoice_count,
        from = ?query.from,
        to = ?query.to,
        "Billing summary computed"
    );

    Ok(Json(BillingSummaryResponse {
        from: query.from,
        to: query.to,
        summary,
    }))
}
