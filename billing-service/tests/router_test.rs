//! Router-level tests that exercise handlers without binding a socket.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use billing_service::services::MemoryInvoiceStore;
use billing_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router() -> Router {
    let state = AppState::new(common::test_config(), Arc::new(MemoryInvoiceStore::new()));
    build_router(state)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn create_then_fetch_through_router() {
    let router = router();

    let (status, created) = send(
        &router,
        Method::POST,
        "/billing",
        Some(common::consultation_invoice()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/billing/{}", created["id"].as_str().unwrap());
    let (status, fetched) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["invoiceNumber"], created["invoiceNumber"]);
    assert_eq!(fetched["totalAmount"], "590.00");
}

#[tokio::test]
async fn malformed_payment_method_is_rejected() {
    let router = router();
    let (_, created) = send(
        &router,
        Method::POST,
        "/billing",
        Some(common::consultation_invoice()),
    )
    .await;

    let uri = format!("/billing/{}/payments", created["id"].as_str().unwrap());
    let (status, _) = send(
        &router,
        Method::POST,
        &uri,
        Some(json!({ "amount": "10", "method": "barter" })),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let router = router();
    let response = router
        .oneshot(
            Request::builder()
                .uri("/patients")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
