//! Application error taxonomy and HTTP response mapping.
//!
//! Every error that can cross the API boundary maps to a distinguishable
//! status code and category. Unknown failures fall back to a generic 500
//! rather than crashing the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::payment::PaymentStatus;

/// Result alias used throughout the service.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad caller input, rejected before any gateway call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The upstream gateway rejected a call or was unreachable on a
    /// write-path operation. `status` is the upstream HTTP status when one
    /// was received.
    #[error("payment gateway error: {message}")]
    Gateway {
        status: Option<u16>,
        message: String,
    },

    /// No payment with the given id (or order) exists.
    #[error("payment not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the payment's current status.
    #[error("cannot {operation} payment in status '{status}'")]
    InvalidState {
        operation: &'static str,
        status: PaymentStatus,
    },

    /// Webhook signature did not match.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Webhook payload is missing a required field or a field is unusable.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable category for the API boundary.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Gateway { .. } => "gateway_error",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState { .. } => "invalid_state",
            AppError::InvalidSignature => "invalid_signature",
            AppError::MalformedPayload(_) => "malformed_payload",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState { .. } => StatusCode::CONFLICT,
            AppError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {}", self);
        }

        let mut body = json!({
            "error": self.code(),
            "detail": self.to_string(),
        });
        if let AppError::Gateway {
            status: Some(upstream),
            ..
        } = &self
        {
            body["upstream_status"] = json!(upstream);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_names_status_and_operation() {
        let err = AppError::InvalidState {
            operation: "refund",
            status: PaymentStatus::Pending,
        };
        let message = err.to_string();
        assert!(message.contains("refund"));
        assert!(message.contains("pending"));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            AppError::Validation("x".into()),
            AppError::Gateway {
                status: Some(500),
                message: "x".into(),
            },
            AppError::NotFound("x".into()),
            AppError::InvalidState {
                operation: "cancel",
                status: PaymentStatus::Success,
            },
            AppError::InvalidSignature,
            AppError::MalformedPayload("x".into()),
            AppError::Storage("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
