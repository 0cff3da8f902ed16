use crate::models::InvoiceFilter;
use crate::services::BillingSummary;
use chrono::NaiveDate;
use clinic_core::error::AppError;
use serde::{Deserialize, Serialize};

/// Inclusive creation-date range for the billing summary.
#[derive(Debug, Default, Deserialize)]
pub struct BillingSummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl BillingSummaryQuery {
    pub fn filter(&self) -> Result<InvoiceFilter, AppError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "'from' must not be after 'to'"
                )));
            }
        }

        Ok(InvoiceFilter {
            created_from: self
                .from
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            created_to: self
                .to
                .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
                .map(|dt| dt.and_utc()),
            ..Default::default()
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummaryResponse {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(flatten)]
    pub summary: BillingSummary,
}
