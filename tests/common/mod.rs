#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
pub use momo_gateway::adapters::FakeGateway;
use momo_gateway::adapters::MemoryPaymentStore;
use momo_gateway::config::{cors_layer, AllowedOrigins};
use momo_gateway::services::{DebugLog, PaymentSettings};
use momo_gateway::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryPaymentStore>,
    pub gateway: Arc<FakeGateway>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryPaymentStore::new());
    let gateway = Arc::new(FakeGateway::new());
    let state = AppState::new(
        store.clone(),
        gateway.clone(),
        "254",
        PaymentSettings::new("KES", "https://api.example.com"),
        DebugLog::default(),
    );
    let router = create_app(state, cors_layer(&AllowedOrigins::Any));
    TestApp {
        router,
        store,
        gateway,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn process(&self, user_id: &str, amount: Value, phone: &str, kind: &str) -> (StatusCode, Value) {
        self.post_json(
            "/payments?action=process",
            json!({ "uuid": user_id, "amount": amount, "phone_number": phone, "type": kind }),
        )
        .await
    }

    pub async fn callback(&self, body: Value) -> (StatusCode, Value) {
        self.post_json("/payments?action=callback", body).await
    }

    pub async fn status(&self, reference: &str) -> (StatusCode, Value) {
        self.get(&format!("/payments?action=status&reference={}", reference))
            .await
    }
}
