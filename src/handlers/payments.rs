//! `/payments?action=process|callback|status`

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::services::debug_log::RESPONSE_TAIL;
use crate::services::ProcessPaymentRequest;
use crate::validation::sanitize_string;
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentQuery {
    /// One of `process`, `callback`, `status`.
    pub action: Option<String>,
    /// Payment reference, required for `status`.
    pub reference: Option<String>,
}

#[utoipa::path(
    post,
    path = "/payments",
    params(PaymentQuery),
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Payment initiated, callback acknowledged or status resolved", body = ProcessPaymentResponse),
        (status = 400, description = "Missing or unknown action, or missing status reference"),
        (status = 404, description = "Unknown payment reference"),
        (status = 405, description = "Action does not accept this method"),
        (status = 500, description = "Payment could not be initiated")
    ),
    tag = "Payments"
)]
pub async fn payments(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<PaymentQuery>,
    body: Bytes,
) -> Response {
    let action = query.action.as_deref().map(str::trim).unwrap_or_default();

    match (action, &method) {
        ("process", &Method::POST) => process(&state, &body).await,
        ("callback", &Method::POST) => callback(&state, &body).await,
        ("status", &Method::GET) => status(&state, query.reference.as_deref()).await,
        ("process" | "callback" | "status", _) => with_logs(
            &state,
            AppError::MethodNotAllowed(format!("{} does not accept {}", action, method)),
        ),
        ("", _) => with_logs(&state, AppError::BadRequest("missing action".to_string())),
        (other, _) => with_logs(
            &state,
            AppError::BadRequest(format!("unknown action '{}'", sanitize_string(other))),
        ),
    }
}

/// Every failure to initiate answers 500, whatever its cause.
async fn process(state: &AppState, body: &[u8]) -> Response {
    let input: ProcessPaymentRequest = match serde_json::from_slice(body) {
        Ok(input) => input,
        Err(e) => {
            return process_failure(state, AppError::BadRequest(format!("invalid JSON body: {}", e)))
        }
    };

    match state.initiator.initiate(input).await {
        Ok(mut response) => {
            response.logs = state.debug_log.tail(RESPONSE_TAIL);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => process_failure(state, e),
    }
}

fn process_failure(state: &AppState, error: AppError) -> Response {
    tracing::error!(error = %error, "Payment initiation failed");
    error.into_response_with_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        state.debug_log.tail(RESPONSE_TAIL),
    )
}

/// Always 200: the provider retries anything else.
async fn callback(state: &AppState, body: &[u8]) -> Response {
    let ack = state.callbacks.handle(body).await;
    (StatusCode::OK, Json(ack)).into_response()
}

async fn status(state: &AppState, reference: Option<&str>) -> Response {
    let reference = reference.map(sanitize_string).unwrap_or_default();
    if reference.is_empty() {
        return with_logs(state, AppError::BadRequest("reference is required".to_string()));
    }

    match state.poller.status(&reference).await {
        Ok(mut body) => {
            if let Some(fields) = body.as_object_mut() {
                fields.insert("logs".to_string(), json!(state.debug_log.tail(RESPONSE_TAIL)));
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => with_logs(state, e),
    }
}

fn with_logs(state: &AppState, error: AppError) -> Response {
    if error.status_code().is_server_error() {
        tracing::error!(error = %error, "Payment request failed");
    } else {
        tracing::debug!(error = %error, "Payment request rejected");
    }
    error.into_response_with_logs(state.debug_log.tail(RESPONSE_TAIL))
}
