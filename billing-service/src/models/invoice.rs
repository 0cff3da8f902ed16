//! Invoice model for billing-service.

use super::payment::{NewPayment, Payment};
use crate::services::calculator::{self, InvoiceTotals};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of an invoice.
///
/// Only `Pending`, `Partial` and `Paid` are ever stored. `Overdue` is derived
/// when reading an invoice whose due date has passed with a balance left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            "overdue" => Ok(PaymentStatus::Overdue),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Pending,
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insurance {
    pub provider: String,
    pub policy_number: String,
    pub claim_amount: Option<Decimal>,
    #[serde(default)]
    pub claim_status: ClaimStatus,
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub invoice_number: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub appointment_id: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub insurance: Option<Insurance>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    /// Bumped on every write; writes are conditioned on the previous value.
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub appointment_id: Option<String>,
    pub items: Vec<NewLineItem>,
    pub discount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub insurance: Option<Insurance>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Editable fields of an existing invoice. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub notes: Option<String>,
    pub discount: Option<Decimal>,
    pub insurance: Option<Insurance>,
}

/// Result of applying a payment.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Applied(Payment),
    /// The idempotency key was already used; carries the original payment.
    Replayed(Payment),
}

impl Invoice {
    /// Build a fresh pending invoice from validated input.
    pub fn create(input: NewInvoice, now: DateTime<Utc>) -> Result<Self, AppError> {
        let patient_id = input.patient_id.trim().to_string();
        if patient_id.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Select a patient")));
        }

        let items = input
            .items
            .iter()
            .map(|item| calculator::line_item(&item.description, item.quantity, item.unit_price))
            .collect::<Result<Vec<_>, _>>()?;
        let totals = InvoiceTotals::compute(&items, input.discount)?;

        let id = Uuid::new_v4();
        let invoice_number = format!(
            "INV-{}-{}",
            now.format("%Y%m%d"),
            &id.simple().to_string()[..8].to_uppercase()
        );

        Ok(Self {
            id: id.to_string(),
            invoice_number,
            patient_id,
            patient_name: input.patient_name,
            appointment_id: input.appointment_id,
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total_amount: totals.total,
            paid_amount: calculator::round_money(Decimal::ZERO),
            balance_amount: totals.total,
            status: calculator::settlement_status(totals.total, Decimal::ZERO),
            due_date: input.due_date,
            notes: input.notes,
            insurance: input.insurance,
            payments: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_payments(&self) -> bool {
        !self.payments.is_empty()
    }

    /// Status as presented to readers, accounting for the due date.
    pub fn effective_status(&self, today: NaiveDate) -> PaymentStatus {
        match self.due_date {
            Some(due) if due < today && self.balance_amount > Decimal::ZERO => {
                PaymentStatus::Overdue
            }
            _ => self.status,
        }
    }

    /// Apply edits. Invoices are locked once a payment has been recorded.
    pub fn apply_changes(&mut self, changes: &InvoiceChanges) -> Result<(), AppError> {
        if self.has_payments() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice cannot be changed after a payment has been recorded"
            )));
        }
        if let Some(discount) = changes.discount {
            let totals = InvoiceTotals::compute(&self.items, discount)?;
            self.subtotal = totals.subtotal;
            self.tax = totals.tax;
            self.discount = totals.discount;
            self.total_amount = totals.total;
            self.balance_amount = totals.total;
            self.status = calculator::settlement_status(self.total_amount, self.paid_amount);
        }
        if let Some(notes) = &changes.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(insurance) = &changes.insurance {
            self.insurance = Some(insurance.clone());
        }
        Ok(())
    }

    /// Apply a payment against the current balance.
    pub fn apply_payment(
        &mut self,
        input: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, AppError> {
        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(existing) = self
                .payments
                .iter()
                .find(|p| p.idempotency_key.as_deref() == Some(key))
            {
                return Ok(PaymentOutcome::Replayed(existing.clone()));
            }
        }

        let amount = calculator::round_money(input.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be greater than zero"
            )));
        }
        if amount > self.balance_amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount cannot exceed balance amount"
            )));
        }

        let payment = Payment {
            payment_id: Uuid::new_v4().to_string(),
            amount,
            method: input.method,
            reference: input.reference.clone(),
            payment_date: input.payment_date.unwrap_or_else(|| now.date_naive()),
            notes: input.notes.clone(),
            idempotency_key: input.idempotency_key.clone(),
            received_at: now,
        };

        self.paid_amount =
            calculator::round_money(calculator::checked_add(self.paid_amount, amount)?);
        self.balance_amount = calculator::round_money(self.total_amount - self.paid_amount);
        self.status = calculator::settlement_status(self.total_amount, self.paid_amount);
        self.payments.push(payment.clone());

        Ok(PaymentOutcome::Applied(payment))
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<PaymentStatus>,
    pub patient_id: Option<String>,
    /// Case-insensitive match on invoice number or patient name.
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice, today: NaiveDate) -> bool {
        if let Some(status) = self.status {
            if invoice.effective_status(today) != status {
                return false;
            }
        }
        if let Some(patient_id) = &self.patient_id {
            if &invoice.patient_id != patient_id {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_number = invoice.invoice_number.to_lowercase().contains(&needle);
            let in_name = invoice
                .patient_name
                .as_deref()
                .map(|name| name.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !in_number && !in_name {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if invoice.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if invoice.created_at > to {
                return false;
            }
        }
        true
    }
}
