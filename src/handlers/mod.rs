pub mod payments;
pub mod wallet;

use crate::health::{check_health, DependencyChecker, ProviderChecker, StoreChecker};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = crate::health::HealthResponse),
        (status = 503, description = "Service is unhealthy", body = crate::health::HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checkers: Vec<Box<dyn DependencyChecker>> = vec![
        Box::new(StoreChecker::new(state.store.clone())),
        Box::new(ProviderChecker::new(state.gateway.clone())),
    ];
    let report = check_health(&checkers, state.start_time).await;

    // Return 503 only when a critical dependency is down
    let status_code = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}
