use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::provider::ProviderError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn body(&self) -> Value {
        self.body_with_status(self.status_code())
    }

    fn body_with_status(&self, status: StatusCode) -> Value {
        json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        })
    }

    /// Error response carrying recent debug log lines.
    pub fn into_response_with_logs(self, logs: Vec<String>) -> Response {
        let status = self.status_code();
        self.into_response_with_status(status, logs)
    }

    /// Like [`AppError::into_response_with_logs`] but answering with `status`
    /// regardless of the error kind.
    pub fn into_response_with_status(self, status: StatusCode, logs: Vec<String>) -> Response {
        let mut body = self.body_with_status(status);
        body["logs"] = json!(logs);
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::InsufficientFunds { user_id } => {
                AppError::InsufficientFunds(format!("balance too low for user {}", user_id))
            }
            RepositoryError::Database(e) => AppError::DatabaseError(e.to_string()),
            RepositoryError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::Provider(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.body())).into_response()
    }
}
