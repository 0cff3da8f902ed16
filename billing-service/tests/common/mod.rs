//! Test helper module for billing-service integration tests.
//!
//! Each `TestApp` runs the real application on a random port with its own
//! in-memory invoice store, so tests are isolated without a database.

#![allow(dead_code)]

use billing_service::config::{
    BillingConfig, CorsConfig, CurrencyConfig, PaymentsConfig, StorageConfig,
};
use billing_service::startup::Application;
use clinic_core::config::{Environment, LogConfig, ServerConfig};
use reqwest::{Client, Response};
use serde_json::{json, Value};

pub const TEST_PATIENT_ID: &str = "patient-0001";

pub fn test_config() -> BillingConfig {
    BillingConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        environment: Environment::Dev,
        service_name: "billing-service-test".to_string(),
        log: LogConfig::default(),
        storage: StorageConfig::default(),
        cors: CorsConfig::default(),
        payments: PaymentsConfig {
            max_write_attempts: 50,
        },
        billing: CurrencyConfig::default(),
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        let app = Application::build(test_config())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for server to be ready by polling health endpoint
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_invoice(&self, body: &Value) -> Response {
        self.client
            .post(self.url("/billing"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create an invoice and return its JSON body.
    pub async fn create_invoice(&self, body: &Value) -> Value {
        let response = self.post_invoice(body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn get_invoice(&self, id: &str) -> Response {
        self.client
            .get(self.url(&format!("/billing/{}", id)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_payment(&self, invoice_id: &str, body: &Value) -> Response {
        self.client
            .post(self.url(&format!("/billing/{}/payments", invoice_id)))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// One consultation at 500: subtotal 500.00, tax 90.00, total 590.00.
pub fn consultation_invoice() -> Value {
    json!({
        "patientId": TEST_PATIENT_ID,
        "patientName": "Asha Rao",
        "items": [
            { "description": "Consultation", "quantity": 1, "unitPrice": 500 }
        ]
    })
}

pub fn cash_payment(amount: &str) -> Value {
    json!({ "amount": amount, "method": "cash" })
}

/// Parse a money field rendered as a decimal string.
pub fn money(value: &Value) -> f64 {
    value
        .as_str()
        .expect("money is rendered as a string")
        .parse()
        .expect("money parses as a number")
}
