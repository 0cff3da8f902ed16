//! Application startup and lifecycle management.

use crate::config::{BillingConfig, CorsConfig, StorageBackend, StorageConfig};
use crate::handlers;
use crate::services::{
    init_metrics, BillingService, InvoiceStore, MemoryInvoiceStore, MongoInvoiceStore,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::get,
    Router,
};
use clinic_core::error::AppError;
use clinic_core::middleware::{
    metrics::metrics_middleware,
    request_id::{request_id_middleware, REQUEST_ID_HEADER},
    security_headers::security_headers_middleware,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BillingConfig>,
    pub billing: BillingService,
}

impl AppState {
    pub fn new(config: BillingConfig, store: Arc<dyn InvoiceStore>) -> Self {
        let billing = BillingService::new(
            store,
            config.payments.max_write_attempts,
            config.billing.currency.clone(),
        );
        Self {
            config: Arc::new(config),
            billing,
        }
    }
}

/// Open the configured invoice store.
pub async fn build_store(storage: &StorageConfig) -> Result<Arc<dyn InvoiceStore>, AppError> {
    match storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory invoice store; data is lost on restart");
            Ok(Arc::new(MemoryInvoiceStore::new()))
        }
        StorageBackend::Mongodb => {
            let uri = storage.mongodb_uri.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "storage.mongodb_uri is required for the mongodb backend"
                ))
            })?;
            let store = MongoInvoiceStore::connect(uri.expose_secret(), &storage.database).await?;
            store.initialize_indexes().await?;
            Ok(Arc::new(store))
        }
    }
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origin = if cors.allowed_origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(handlers::payments::IDEMPOTENCY_KEY_HEADER),
        ])
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/billing",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route(
            "/billing/:id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
        .route(
            "/billing/:id/payments",
            get(handlers::list_payments).post(handlers::record_payment),
        )
        .route("/reports/billing", get(handlers::billing_summary))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: BillingConfig) -> Result<Self, AppError> {
        let store = build_store(&config.storage).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to open invoice store");
            e
        })?;
        Self::build_with_store(config, store).await
    }

    /// Build the application around an already opened store.
    pub async fn build_with_store(
        config: BillingConfig,
        store: Arc<dyn InvoiceStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        // Port 0 binds a random port for tests
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            storage = ?config.storage.backend,
            "Billing service listener bound"
        );

        let router = build_router(AppState::new(config, store));

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "billing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await
    }
}
