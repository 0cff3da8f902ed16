use super::InvoiceStore;
use crate::models::{Invoice, InvoiceFilter, PaymentStatus};
use crate::services::metrics::STORE_QUERY_DURATION;
use async_trait::async_trait;
use chrono::NaiveDate;
use clinic_core::error::AppError;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed invoice store: one document per invoice, payments embedded.
#[derive(Clone)]
pub struct MongoInvoiceStore {
    client: MongoClient,
    db: Database,
}

impl MongoInvoiceStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for billing-service");

        let number_index = IndexModel::builder()
            .keys(doc! { "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_number_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let patient_index = IndexModel::builder()
            .keys(doc! { "patient_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("patient_created_idx".to_string())
                    .build(),
            )
            .build();

        // Overdue lookups filter on stored status plus due date
        let status_due_index = IndexModel::builder()
            .keys(doc! { "status": 1, "due_date": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_due_date_idx".to_string())
                    .build(),
            )
            .build();

        let created_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        self.invoices()
            .create_indexes(
                [number_index, patient_index, status_due_index, created_index],
                None,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to create invoice indexes: {}", e);
                AppError::from(e)
            })?;

        tracing::info!("Billing service indexes initialized");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

/// Escape user input for use inside a `$regex`.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#-/".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translate an invoice filter into a query document.
///
/// Overdue is not stored, so status filters are rewritten against the stored
/// status and the due date, mirroring `Invoice::effective_status`.
pub(crate) fn filter_document(filter: &InvoiceFilter, today: NaiveDate) -> Document {
    let today = today.to_string();
    let not_yet_due = doc! {
        "$or": [
            { "due_date": Bson::Null },
            { "due_date": { "$gte": today.as_str() } },
        ]
    };

    let mut clauses: Vec<Document> = Vec::new();

    match filter.status {
        Some(PaymentStatus::Overdue) => {
            clauses.push(doc! {
                "status": { "$in": [PaymentStatus::Pending.as_str(), PaymentStatus::Partial.as_str()] },
                "due_date": { "$lt": today.as_str() },
            });
        }
        Some(PaymentStatus::Paid) => {
            clauses.push(doc! { "status": PaymentStatus::Paid.as_str() });
        }
        Some(status) => {
            clauses.push(doc! { "status": status.as_str() });
            clauses.push(not_yet_due);
        }
        None => {}
    }

    if let Some(patient_id) = &filter.patient_id {
        clauses.push(doc! { "patient_id": patient_id.as_str() });
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = escape_regex(search);
        clauses.push(doc! {
            "$or": [
                { "invoice_number": { "$regex": pattern.as_str(), "$options": "i" } },
                { "patient_name": { "$regex": pattern.as_str(), "$options": "i" } },
            ]
        });
    }

    let mut created = Document::new();
    if let Some(from) = filter.created_from {
        created.insert("$gte", BsonDateTime::from_chrono(from));
    }
    if let Some(to) = filter.created_to {
        created.insert("$lte", BsonDateTime::from_chrono(to));
    }
    if !created.is_empty() {
        clauses.push(doc! { "created_at": created });
    }

    if clauses.is_empty() {
        Document::new()
    } else {
        doc! { "$and": clauses }
    }
}

#[async_trait]
impl InvoiceStore for MongoInvoiceStore {
    async fn insert(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let result = self.invoices().insert_one(invoice, None).await;
        timer.observe_duration();

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already exists",
                invoice.invoice_number
            ))),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = self.invoices().find_one(doc! { "_id": id }, None).await?;
        timer.observe_duration();
        Ok(invoice)
    }

    async fn replace(&self, invoice: &Invoice, expected_version: i64) -> Result<bool, AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["replace_invoice"])
            .start_timer();

        let filter = doc! { "_id": invoice.id.as_str(), "version": expected_version };
        let result = self.invoices().replace_one(filter, invoice, None).await?;
        timer.observe_duration();

        Ok(result.matched_count == 1)
    }

    async fn delete(&self, id: &str, expected_version: i64) -> Result<bool, AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let filter = doc! { "_id": id, "version": expected_version };
        let result = self.invoices().delete_one(filter, None).await?;
        timer.observe_duration();

        Ok(result.deleted_count == 1)
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let query = filter_document(filter, today);
        let total = self
            .invoices()
            .count_documents(query.clone(), None)
            .await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "invoice_number": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();

        let cursor = self.invoices().find(query, Some(options)).await?;
        let invoices: Vec<Invoice> = cursor.try_collect().await?;
        timer.observe_duration();

        Ok((invoices, total))
    }

    async fn scan(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["scan_invoices"])
            .start_timer();

        let cursor = self
            .invoices()
            .find(filter_document(filter, today), None)
            .await?;
        let invoices: Vec<Invoice> = cursor.try_collect().await?;
        timer.observe_duration();

        Ok(invoices)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(filter_document(&InvoiceFilter::default(), today()).is_empty());
    }

    #[test]
    fn overdue_filter_uses_stored_status_and_due_date() {
        let filter = InvoiceFilter {
            status: Some(PaymentStatus::Overdue),
            ..Default::default()
        };
        let query = filter_document(&filter, today());
        let clauses = query.get_array("$and").unwrap();
        let clause = clauses[0].as_document().unwrap();

        assert_eq!(
            clause.get_document("due_date").unwrap().get_str("$lt").unwrap(),
            "2026-05-01"
        );
        assert_eq!(
            clause
                .get_document("status")
                .unwrap()
                .get_array("$in")
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn pending_filter_excludes_past_due() {
        let filter = InvoiceFilter {
            status: Some(PaymentStatus::Pending),
            ..Default::default()
        };
        let query = filter_document(&filter, today());
        let clauses = query.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses[1].as_document().unwrap().contains_key("$or"));
    }

    #[test]
    fn search_is_escaped() {
        assert_eq!(escape_regex("INV-2026.1"), "INV\\-2026\\.1");
        assert_eq!(escape_regex("a(b)"), "a\\(b\\)");
    }
}
