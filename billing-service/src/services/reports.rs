//! Billing summary aggregation.

use crate::models::{Invoice, PaymentMethod, PaymentStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::calculator::{checked_add, round_money};
use clinic_core::error::AppError;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    pub currency: String,
    pub invoice_count: u64,
    pub total_billed: Decimal,
    pub total_collected: Decimal,
    pub total_outstanding: Decimal,
    pub by_status: BTreeMap<PaymentStatus, u64>,
    pub collected_by_method: BTreeMap<PaymentMethod, Decimal>,
}

/// Aggregate a set of invoices. Statuses are counted as readers see them,
/// so past-due invoices land under `overdue`.
pub fn summarize(
    invoices: &[Invoice],
    today: NaiveDate,
    currency: &str,
) -> Result<BillingSummary, AppError> {
    let mut total_billed = Decimal::ZERO;
    let mut total_collected = Decimal::ZERO;
    let mut total_outstanding = Decimal::ZERO;
    let mut by_status = BTreeMap::new();
    let mut collected_by_method: BTreeMap<PaymentMethod, Decimal> = BTreeMap::new();

    for invoice in invoices {
        total_billed = checked_add(total_billed, invoice.total_amount)?;
        total_collected = checked_add(total_collected, invoice.paid_amount)?;
        total_outstanding = checked_add(total_outstanding, invoice.balance_amount)?;
        *by_status.entry(invoice.effective_status(today)).or_insert(0) += 1;

        for payment in &invoice.payments {
            let collected = collected_by_method
                .entry(payment.method)
                .or_insert(Decimal::ZERO);
            *collected = checked_add(*collected, payment.amount)?;
        }
    }

    for amount in collected_by_method.values_mut() {
        *amount = round_money(*amount);
    }

    Ok(BillingSummary {
        currency: currency.to_string(),
        invoice_count: invoices.len() as u64,
        total_billed: round_money(total_billed),
        total_collected: round_money(total_collected),
        total_outstanding: round_money(total_outstanding),
        by_status,
        collected_by_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewInvoice, NewLineItem, NewPayment};
    use chrono::Utc;

    fn invoice(price: i64, due_date: Option<NaiveDate>) -> Invoice {
        Invoice::create(
            NewInvoice {
                patient_id: "p-1".to_string(),
                patient_name: None,
                appointment_id: None,
                items: vec![NewLineItem {
                    description: "Therapy session".to_string(),
                    quantity: Decimal::ONE,
                    unit_price: Decimal::from(price),
                }],
                discount: Decimal::ZERO,
                due_date,
                notes: None,
                insurance: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn pay(invoice: &mut Invoice, amount: i64, method: PaymentMethod) {
        invoice
            .apply_payment(
                &NewPayment {
                    amount: Decimal::from(amount),
                    method,
                    reference: None,
                    payment_date: None,
                    notes: None,
                    idempotency_key: None,
                },
                Utc::now(),
            )
            .unwrap();
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = summarize(&[], Utc::now().date_naive(), "INR").unwrap();
        assert_eq!(summary.invoice_count, 0);
        assert_eq!(summary.total_billed.to_string(), "0.00");
        assert!(summary.by_status.is_empty());
    }

    #[test]
    fn totals_and_breakdowns_add_up() {
        let today = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();
        let last_week = NaiveDate::from_ymd_opt(2026, 4, 8).unwrap();

        let mut paid = invoice(500, None);
        pay(&mut paid, 300, PaymentMethod::Upi);
        pay(&mut paid, 290, PaymentMethod::Cash);

        let mut overdue = invoice(1000, Some(last_week));
        pay(&mut overdue, 180, PaymentMethod::Cash);

        let pending = invoice(100, None);

        let summary = summarize(&[paid, overdue, pending], today, "INR").unwrap();

        assert_eq!(summary.invoice_count, 3);
        assert_eq!(summary.total_billed, Decimal::from(1888));
        assert_eq!(summary.total_collected, Decimal::from(770));
        assert_eq!(summary.total_outstanding, Decimal::from(1118));
        assert_eq!(
            summary.total_billed,
            summary.total_collected + summary.total_outstanding
        );
        assert_eq!(summary.by_status.get(&PaymentStatus::Paid), Some(&1));
        assert_eq!(summary.by_status.get(&PaymentStatus::Overdue), Some(&1));
        assert_eq!(summary.by_status.get(&PaymentStatus::Pending), Some(&1));
        assert_eq!(
            summary.collected_by_method.get(&PaymentMethod::Cash),
            Some(&Decimal::from(470))
        );
        assert_eq!(
            summary.collected_by_method.get(&PaymentMethod::Upi),
            Some(&Decimal::from(300))
        );
    }
}
