//! Billing report integration tests for billing-service.

mod common;

use common::{cash_payment, consultation_invoice, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn summary_aggregates_invoices_and_payments() {
    let app = TestApp::spawn().await;

    let paid = app.create_invoice(&consultation_invoice()).await;
    app.post_payment(paid["id"].as_str().unwrap(), &cash_payment("590"))
        .await;

    let partial = app.create_invoice(&consultation_invoice()).await;
    app.post_payment(
        partial["id"].as_str().unwrap(),
        &json!({ "amount": "100", "method": "card" }),
    )
    .await;

    app.create_invoice(&consultation_invoice()).await;

    let summary: Value = app
        .client
        .get(app.url("/reports/billing"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary["currency"], "INR");
    assert_eq!(summary["invoiceCount"], 3);
    assert_eq!(summary["totalBilled"], "1770.00");
    assert_eq!(summary["totalCollected"], "690.00");
    assert_eq!(summary["totalOutstanding"], "1080.00");
    assert_eq!(summary["byStatus"]["paid"], 1);
    assert_eq!(summary["byStatus"]["partial"], 1);
    assert_eq!(summary["byStatus"]["pending"], 1);
    assert_eq!(summary["collectedByMethod"]["cash"], "590.00");
    assert_eq!(summary["collectedByMethod"]["card"], "100.00");
}

#[tokio::test]
async fn summary_respects_date_range() {
    let app = TestApp::spawn().await;
    app.create_invoice(&consultation_invoice()).await;

    let past: Value = app
        .client
        .get(app.url("/reports/billing?from=2000-01-01&to=2000-12-31"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(past["invoiceCount"], 0);
    assert_eq!(past["from"], "2000-01-01");

    let inverted = app
        .client
        .get(app.url("/reports/billing?from=2000-12-31&to=2000-01-01"))
        .send()
        .await
        .unwrap();
    assert_eq!(inverted.status().as_u16(), 400);
}
