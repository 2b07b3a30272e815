//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Error returned by a service.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Domain(DomainError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Domain(DomainError::PaymentAlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        metrics::counter!("http_errors_total", "status" => status.as_str().to_owned())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }

        let body = serde_json::json!({ "message": message, "time": Utc::now() });
        (status, axum::Json(body)).into_response()
    }
}
