//! Invoice and payment operations.

use crate::models::{
    Invoice, InvoiceChanges, InvoiceFilter, NewInvoice, NewPayment, Payment, PaymentOutcome,
};
use crate::services::metrics::{
    ERRORS_TOTAL, INVOICES_CREATED_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL,
    WRITE_CONFLICTS_TOTAL,
};
use crate::services::reports::{self, BillingSummary};
use crate::services::store::InvoiceStore;
use chrono::{NaiveDate, Utc};
use clinic_core::error::AppError;
use clinic_core::pagination::PageParams;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a mutation decided to do with the invoice it was handed.
enum Mutation<R> {
    /// Persist the mutated invoice.
    Write(R),
    /// Leave the stored invoice untouched.
    Keep(R),
}

/// Billing operations over an [`InvoiceStore`].
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn InvoiceStore>,
    max_write_attempts: u32,
    currency: String,
}

impl BillingService {
    pub fn new(store: Arc<dyn InvoiceStore>, max_write_attempts: u32, currency: String) -> Self {
        Self {
            store,
            max_write_attempts: max_write_attempts.max(1),
            currency,
        }
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.store.health_check().await
    }

    #[instrument(skip(self, input), fields(patient_id = %input.patient_id))]
    pub async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, AppError> {
        let invoice = Invoice::create(input, Utc::now()).map_err(count_error)?;
        self.store.insert(&invoice).await.map_err(count_error)?;

        INVOICES_CREATED_TOTAL.inc();
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Invoice, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }

    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: &PageParams,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        self.store
            .list(filter, Self::today(), page.skip(), page.limit())
            .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_invoice(
        &self,
        id: &str,
        changes: InvoiceChanges,
    ) -> Result<Invoice, AppError> {
        let (invoice, ()) = self
            .mutate(id, |invoice| {
                invoice.apply_changes(&changes)?;
                Ok(Mutation::Write(()))
            })
            .await?;

        info!(invoice_id = %invoice.id, version = invoice.version, "Invoice updated");
        Ok(invoice)
    }

    /// Delete an invoice that has no payments recorded against it.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: &str) -> Result<(), AppError> {
        for _ in 0..self.max_write_attempts {
            let invoice = self.get_invoice(id).await?;
            if invoice.has_payments() {
                return Err(count_error(AppError::Conflict(anyhow::anyhow!(
                    "Invoice with recorded payments cannot be deleted"
                ))));
            }
            if self.store.delete(id, invoice.version).await? {
                info!(invoice_id = %id, "Invoice deleted");
                return Ok(());
            }
            WRITE_CONFLICTS_TOTAL.inc();
            tokio::task::yield_now().await;
        }
        Err(count_error(concurrent_modification()))
    }

    /// Record a payment. Returns the updated invoice, the payment and whether
    /// the call replayed an earlier payment with the same idempotency key.
    #[instrument(skip(self, input), fields(amount = %input.amount, method = input.method.as_str()))]
    pub async fn record_payment(
        &self,
        id: &str,
        input: NewPayment,
    ) -> Result<(Invoice, Payment, bool), AppError> {
        let (invoice, outcome) = self
            .mutate(id, |invoice| {
                match invoice.apply_payment(&input, Utc::now())? {
                    PaymentOutcome::Applied(payment) => Ok(Mutation::Write((payment, false))),
                    PaymentOutcome::Replayed(payment) => Ok(Mutation::Keep((payment, true))),
                }
            })
            .await?;
        let (payment, replayed) = outcome;

        if replayed {
            info!(
                invoice_id = %invoice.id,
                payment_id = %payment.payment_id,
                "Payment replayed by idempotency key"
            );
        } else {
            PAYMENTS_TOTAL
                .with_label_values(&[payment.method.as_str()])
                .inc();
            if let Some(amount) = payment.amount.to_f64() {
                PAYMENT_AMOUNT_TOTAL
                    .with_label_values(&[self.currency.as_str()])
                    .inc_by(amount);
            }
            info!(
                invoice_id = %invoice.id,
                payment_id = %payment.payment_id,
                amount = %payment.amount,
                balance_amount = %invoice.balance_amount,
                status = invoice.status.as_str(),
                "Payment recorded"
            );
        }

        Ok((invoice, payment, replayed))
    }

    pub async fn list_payments(&self, id: &str) -> Result<Vec<Payment>, AppError> {
        Ok(self.get_invoice(id).await?.payments)
    }

    pub async fn billing_summary(&self, filter: &InvoiceFilter) -> Result<BillingSummary, AppError> {
        let today = Self::today();
        let invoices = self.store.scan(filter, today).await?;
        reports::summarize(&invoices, today, &self.currency)
    }

    /// Read-modify-write an invoice under optimistic concurrency.
    ///
    /// `apply` runs against a freshly loaded copy on every attempt, so any
    /// check it makes (such as the balance check) holds for the version that
    /// is finally written.
    async fn mutate<R, F>(&self, id: &str, mut apply: F) -> Result<(Invoice, R), AppError>
    where
        F: FnMut(&mut Invoice) -> Result<Mutation<R>, AppError>,
    {
        for attempt in 1..=self.max_write_attempts {
            let mut invoice = self.get_invoice(id).await?;
            let expected_version = invoice.version;

            match apply(&mut invoice).map_err(count_error)? {
                Mutation::Keep(result) => return Ok((invoice, result)),
                Mutation::Write(result) => {
                    invoice.version = expected_version + 1;
                    invoice.updated_at = Utc::now();

                    if self.store.replace(&invoice, expected_version).await? {
                        return Ok((invoice, result));
                    }
                }
            }

            WRITE_CONFLICTS_TOTAL.inc();
            debug!(invoice_id = %id, attempt, "Invoice changed concurrently, retrying");
            tokio::task::yield_now().await;
        }

        warn!(
            invoice_id = %id,
            attempts = self.max_write_attempts,
            "Giving up on contended invoice write"
        );
        Err(count_error(concurrent_modification()))
    }
}

fn concurrent_modification() -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "Invoice was modified concurrently, please retry"
    ))
}

fn count_error(err: AppError) -> AppError {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
    err
}
