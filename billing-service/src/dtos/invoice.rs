use crate::models::{
    ClaimStatus, Insurance, Invoice, InvoiceChanges, InvoiceFilter, LineItem, NewInvoice,
    NewLineItem, PaymentStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::error::AppError;
use clinic_core::pagination::PageParams;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::payment::PaymentResponse;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Select a patient"))]
    pub patient_id: String,

    pub patient_name: Option<String>,

    pub appointment_id: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "Add at least one item"), nested)]
    pub items: Vec<LineItemRequest>,

    #[serde(default)]
    pub discount: Decimal,

    pub due_date: Option<NaiveDate>,

    pub notes: Option<String>,

    #[validate(nested)]
    pub insurance: Option<InsuranceRequest>,
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            patient_id: req.patient_id,
            patient_name: req.patient_name,
            appointment_id: req.appointment_id,
            items: req.items.into_iter().map(NewLineItem::from).collect(),
            discount: req.discount,
            due_date: req.due_date,
            notes: req.notes,
            insurance: req.insurance.map(Insurance::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[validate(length(min = 1, message = "Item description is required"))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl From<LineItemRequest> for NewLineItem {
    fn from(req: LineItemRequest) -> Self {
        Self {
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceRequest {
    #[validate(length(min = 1, message = "Insurance provider is required"))]
    pub provider: String,
    #[validate(length(min = 1, message = "Policy number is required"))]
    pub policy_number: String,
    #[validate(custom(function = "non_negative_claim"))]
    pub claim_amount: Option<Decimal>,
    #[serde(default)]
    pub claim_status: ClaimStatus,
}

fn non_negative_claim(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.message = Some("Claim amount cannot be negative".into());
        return Err(error);
    }
    Ok(())
}

impl From<InsuranceRequest> for Insurance {
    fn from(req: InsuranceRequest) -> Self {
        Self {
            provider: req.provider,
            policy_number: req.policy_number,
            claim_amount: req.claim_amount,
            claim_status: req.claim_status,
        }
    }
}

/// Editable fields. Absent fields are left as they are.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub notes: Option<String>,
    pub discount: Option<Decimal>,
    #[validate(nested)]
    pub insurance: Option<InsuranceRequest>,
}

impl From<UpdateInvoiceRequest> for InvoiceChanges {
    fn from(req: UpdateInvoiceRequest) -> Self {
        Self {
            notes: req.notes,
            discount: req.discount,
            insurance: req.insurance.map(Insurance::from),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub patient_id: Option<String>,
    pub search: Option<String>,
}

impl ListInvoicesQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams::new(self.page, self.limit)
    }

    pub fn filter(&self) -> Result<InvoiceFilter, AppError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<PaymentStatus>()
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?,
            ),
        };

        Ok(InvoiceFilter {
            status,
            patient_id: non_blank(&self.patient_id),
            search: non_blank(&self.search),
            ..Default::default()
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResponse {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        Self {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: item.amount,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceResponse {
    pub provider: String,
    pub policy_number: String,
    pub claim_amount: Option<Decimal>,
    pub claim_status: ClaimStatus,
}

impl From<Insurance> for InsuranceResponse {
    fn from(insurance: Insurance) -> Self {
        Self {
            provider: insurance.provider,
            policy_number: insurance.policy_number,
            claim_amount: insurance.claim_amount,
            claim_status: insurance.claim_status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: String,
    pub invoice_number: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub appointment_id: Option<String>,
    pub items: Vec<LineItemResponse>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub insurance: Option<InsuranceResponse>,
    pub payments: Vec<PaymentResponse>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    /// Render an invoice with its status as of `today`.
    pub fn from_invoice(invoice: Invoice, today: NaiveDate) -> Self {
        let payment_status = invoice.effective_status(today);
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            patient_id: invoice.patient_id,
            patient_name: invoice.patient_name,
            appointment_id: invoice.appointment_id,
            items: invoice.items.into_iter().map(Into::into).collect(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            discount: invoice.discount,
            total_amount: invoice.total_amount,
            paid_amount: invoice.paid_amount,
            balance_amount: invoice.balance_amount,
            payment_status,
            due_date: invoice.due_date,
            notes: invoice.notes,
            insurance: invoice.insurance.map(Into::into),
            payments: invoice.payments.into_iter().map(Into::into).collect(),
            version: invoice.version,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_reports_form_messages() {
        let req: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        let errors = req.validate().unwrap_err().to_string();
        assert!(errors.contains("Select a patient"));
        assert!(errors.contains("Add at least one item"));
    }

    #[test]
    fn create_request_accepts_numbers_and_strings() {
        let req: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "patientId": "p-1",
            "items": [
                { "description": "Consultation", "quantity": 1, "unitPrice": 500 },
                { "description": "Dressing", "quantity": "2", "unitPrice": "75.50" }
            ]
        }))
        .unwrap();

        assert!(req.validate().is_ok());
        assert_eq!(req.items[1].unit_price.to_string(), "75.50");
        assert_eq!(req.discount, Decimal::ZERO);
    }

    #[test]
    fn negative_claim_amount_is_rejected() {
        let req: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "patientId": "p-1",
            "items": [{ "description": "Consultation", "quantity": 1, "unitPrice": 500 }],
            "insurance": {
                "provider": "Star Health",
                "policyNumber": "SH-1",
                "claimAmount": "-10"
            }
        }))
        .unwrap();
        let errors = req.validate().unwrap_err().to_string();
        assert!(errors.contains("Claim amount cannot be negative"));

        let update: UpdateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "insurance": { "provider": "Star Health", "policyNumber": "SH-1", "claimAmount": "0" }
        }))
        .unwrap();
        assert!(update.validate().is_ok());
    }

    #[test]
    fn list_query_parses_status() {
        let query = ListInvoicesQuery {
            status: Some("Overdue".to_string()),
            patient_id: Some("  ".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(PaymentStatus::Overdue));
        assert!(filter.patient_id.is_none());

        let all = ListInvoicesQuery {
            status: Some("all".to_string()),
            ..Default::default()
        };
        assert!(all.filter().unwrap().status.is_none());

        let bogus = ListInvoicesQuery {
            status: Some("settled".to_string()),
            ..Default::default()
        };
        assert!(matches!(bogus.filter(), Err(AppError::BadRequest(_))));
    }
}
