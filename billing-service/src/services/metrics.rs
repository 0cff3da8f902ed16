//! Prometheus metrics for billing-service.
//!
//! HTTP request metrics go through the `metrics` facade and its Prometheus
//! recorder. Business counters live in the default `prometheus` registry.
//! `/metrics` renders both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec,
    HistogramVec, IntCounter, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Invoices created.
pub static INVOICES_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_invoices_created_total",
        "Total number of invoices created"
    )
    .expect("Failed to register invoices_created_total")
});

/// Payments recorded by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_payments_total",
        "Total number of payments recorded by payment method",
        &["method"]
    )
    .expect("Failed to register payments_total")
});

/// Payment amount by currency.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_payment_amount_total",
        "Total payment amount by currency",
        &["currency"]
    )
    .expect("Failed to register payment_amount_total")
});

/// Version-check misses on invoice writes.
pub static WRITE_CONFLICTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_write_conflicts_total",
        "Invoice writes retried because another writer changed the invoice"
    )
    .expect("Failed to register write_conflicts_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Store operation duration histogram.
pub static STORE_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "billing_store_query_duration_seconds",
        "Invoice store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register store_query_duration")
});

/// Install the HTTP metrics recorder and force business metric registration.
///
/// Safe to call more than once; only the first call installs the recorder.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
        }
    }

    Lazy::force(&INVOICES_CREATED_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
    Lazy::force(&WRITE_CONFLICTS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&STORE_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    if let Ok(business) = encoder.encode_to_string(&prometheus::gather()) {
        output.push_str(&business);
    }

    output
}
