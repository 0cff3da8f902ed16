use super::InvoiceStore;
use crate::models::{Invoice, InvoiceFilter};
use async_trait::async_trait;
use chrono::NaiveDate;
use clinic_core::error::AppError;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

/// In-process invoice store for tests and local runs. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryInvoiceStore {
    invoices: Arc<DashMap<String, Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, filter: &InvoiceFilter, today: NaiveDate) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|entry| filter.matches(entry.value(), today))
            .map(|entry| entry.value().clone())
            .collect();
        invoices.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });
        invoices
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn insert(&self, invoice: &Invoice) -> Result<(), AppError> {
        if self
            .invoices
            .iter()
            .any(|entry| entry.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already exists",
                invoice.invoice_number
            )));
        }

        match self.invoices.entry(invoice.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} already exists",
                invoice.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(invoice.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.get(id).map(|entry| entry.value().clone()))
    }

    async fn replace(&self, invoice: &Invoice, expected_version: i64) -> Result<bool, AppError> {
        match self.invoices.get_mut(&invoice.id) {
            Some(mut current) if current.version == expected_version => {
                *current = invoice.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &str, expected_version: i64) -> Result<bool, AppError> {
        Ok(self
            .invoices
            .remove_if(id, |_, current| current.version == expected_version)
            .is_some())
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        let matching = self.matching(filter, today);
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn scan(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        Ok(self.matching(filter, today))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewInvoice, NewLineItem, PaymentStatus};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn invoice(patient: &str, offset_secs: i64) -> Invoice {
        Invoice::create(
            NewInvoice {
                patient_id: patient.to_string(),
                patient_name: None,
                appointment_id: None,
                items: vec![NewLineItem {
                    description: "Consultation".to_string(),
                    quantity: Decimal::ONE,
                    unit_price: Decimal::from(500),
                }],
                discount: Decimal::ZERO,
                due_date: None,
                notes: None,
                insurance: None,
            },
            Utc::now() + Duration::seconds(offset_secs),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn replace_requires_matching_version() {
        let store = MemoryInvoiceStore::new();
        let mut stored = invoice("p-1", 0);
        store.insert(&stored).await.unwrap();

        stored.version = 1;
        stored.notes = Some("first".to_string());
        assert!(store.replace(&stored, 0).await.unwrap());

        let mut stale = stored.clone();
        stale.version = 1;
        stale.notes = Some("stale".to_string());
        assert!(!store.replace(&stale, 0).await.unwrap());

        let current = store.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(current.notes.as_deref(), Some("first"));
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn delete_requires_matching_version() {
        let store = MemoryInvoiceStore::new();
        let stored = invoice("p-1", 0);
        store.insert(&stored).await.unwrap();

        assert!(!store.delete(&stored.id, 7).await.unwrap());
        assert!(store.delete(&stored.id, 0).await.unwrap());
        assert!(store.get(&stored.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryInvoiceStore::new();
        let stored = invoice("p-1", 0);
        store.insert(&stored).await.unwrap();

        let err = store.insert(&stored).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let store = MemoryInvoiceStore::new();
        for offset in 0..5 {
            store.insert(&invoice("p-1", offset)).await.unwrap();
        }
        store.insert(&invoice("p-2", 10)).await.unwrap();

        let filter = InvoiceFilter {
            patient_id: Some("p-1".to_string()),
            status: Some(PaymentStatus::Pending),
            ..Default::default()
        };
        let today = Utc::now().date_naive();
        let (page, total) = store.list(&filter, today, 2, 2).await.unwrap();

        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at > page[1].created_at);
        assert!(page.iter().all(|i| i.patient_id == "p-1"));
    }
}
