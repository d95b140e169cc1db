pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod provider;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use crate::ports::{PaymentGateway, PaymentStore};
use crate::services::{
    CallbackHandler, DebugLog, PaymentInitiator, PaymentSettings, StatusCache, StatusPoller,
};
use crate::validation::PhoneNormalizer;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::payments::payments,
        handlers::wallet::get_balance,
        handlers::wallet::list_transactions,
    ),
    components(
        schemas(
            health::HealthResponse,
            services::ProcessPaymentRequest,
            services::ProcessPaymentResponse,
            services::CallbackAck,
            handlers::wallet::BalanceResponse,
        )
    ),
    info(
        title = "Mobile-money Payment Gateway",
        description = "Deposits and withdrawals through an M-Pesa provider with idempotent callbacks"
    ),
    tags(
        (name = "Payments", description = "Initiation, provider callbacks and status polling"),
        (name = "Wallet", description = "Balance and ledger reads"),
        (name = "Health", description = "Dependency health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub initiator: Arc<PaymentInitiator>,
    pub callbacks: Arc<CallbackHandler>,
    pub poller: Arc<StatusPoller>,
    pub settings: PaymentSettings,
    pub debug_log: DebugLog,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the payment services around one store, one gateway and one
    /// shared status cache.
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        country_prefix: &str,
        settings: PaymentSettings,
        debug_log: DebugLog,
    ) -> Self {
        let cache = Arc::new(StatusCache::new());

        let initiator = PaymentInitiator::new(
            store.clone(),
            gateway.clone(),
            PhoneNormalizer::new(country_prefix),
            settings.clone(),
        );
        let callbacks = CallbackHandler::new(store.clone(), cache.clone(), settings.clone());
        let poller = StatusPoller::new(store.clone(), gateway.clone(), cache, settings.clone());

        Self {
            store,
            gateway,
            initiator: Arc::new(initiator),
            callbacks: Arc::new(callbacks),
            poller: Arc::new(poller),
            settings,
            debug_log,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/payments",
            get(handlers::payments::payments).post(handlers::payments::payments),
        )
        .route("/users/:user_id/balance", get(handlers::wallet::get_balance))
        .route(
            "/users/:user_id/transactions",
            get(handlers::wallet::list_transactions),
        )
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
