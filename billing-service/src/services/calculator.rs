//! Invoice arithmetic.
//!
//! All money is rounded to two decimal places, half away from zero, and
//! carried at scale 2 so it renders as `"590.00"`. Arithmetic is checked;
//! values past the `Decimal` range are rejected rather than panicking.

use crate::models::{LineItem, PaymentStatus};
use clinic_core::error::AppError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Flat tax rate applied to every invoice subtotal (18%).
pub const TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Round to two places and fix the scale at 2.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn out_of_range() -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Amount out of range"))
}

pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_add(b).ok_or_else(out_of_range)
}

pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, AppError> {
    quantity
        .checked_mul(unit_price)
        .map(round_money)
        .ok_or_else(out_of_range)
}

/// Build a line item, validating its inputs and computing its amount.
///
/// The amount is computed from the stored (rounded) unit price.
pub fn line_item(
    description: &str,
    quantity: Decimal,
    unit_price: Decimal,
) -> Result<LineItem, AppError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Item description is required"
        )));
    }
    if quantity <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Item quantity must be greater than zero"
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Item unit price cannot be negative"
        )));
    }

    let unit_price = round_money(unit_price);
    Ok(LineItem {
        description: description.to_string(),
        quantity,
        unit_price,
        amount: line_amount(quantity, unit_price)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Compute subtotal, tax and total for `items` less `discount`.
    ///
    /// The discount may not exceed subtotal plus tax, so totals are never negative.
    pub fn compute(items: &[LineItem], discount: Decimal) -> Result<Self, AppError> {
        if items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Add at least one item"
            )));
        }
        if discount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount cannot be negative"
            )));
        }

        let subtotal = round_money(
            items
                .iter()
                .try_fold(Decimal::ZERO, |acc, item| checked_add(acc, item.amount))?,
        );
        let tax = round_money(subtotal.checked_mul(TAX_RATE).ok_or_else(out_of_range)?);
        let discount = round_money(discount);
        let gross = checked_add(subtotal, tax)?;

        if discount > gross {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount {} cannot exceed invoice amount {}",
                discount,
                gross
            )));
        }

        Ok(Self {
            subtotal,
            tax,
            discount,
            total: round_money(gross - discount),
        })
    }
}

/// Stored status for a given total and paid amount. Never returns `Overdue`.
pub fn settlement_status(total: Decimal, paid: Decimal) -> PaymentStatus {
    if paid >= total {
        PaymentStatus::Paid
    } else if paid > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}
