//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use exchange::{ExchangeError, INSUFFICIENT_TOKENS_MESSAGE};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Error raised by the exchange core
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Exchange(err.into())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED", msg.clone()),
            ApiError::Exchange(err) => match err {
                ExchangeError::SelfRequest | ExchangeError::Validation(_) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    err.to_string(),
                ),
                ExchangeError::InsufficientTokens => (
                    StatusCode::BAD_REQUEST,
                    "INSUFFICIENT_TOKENS",
                    INSUFFICIENT_TOKENS_MESSAGE.to_string(),
                ),
                ExchangeError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    "INSUFFICIENT_BALANCE",
                    err.to_string(),
                ),
                ExchangeError::NotAuthorized(msg) => {
                    (StatusCode::FORBIDDEN, "NOT_AUTHORIZED", msg.clone())
                }
                ExchangeError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                ExchangeError::AlreadyResolved { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_RESOLVED", err.to_string())
                }
                ExchangeError::AlreadyCompleted { .. } => {
                    (StatusCode::CONFLICT, "ALREADY_COMPLETED", err.to_string())
                }
                ExchangeError::Database(db_err) => {
                    error!(error = %db_err, "Database error");
                    internal()
                }
            },
            ApiError::Database(db_err) => {
                error!(error = %db_err, "Database error");
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": message,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::models::RequestStatus;
    use uuid::Uuid;

    fn status_and_code(err: ApiError) -> (StatusCode, &'static str, String) {
        err.parts()
    }

    #[test]
    fn insufficient_tokens_is_surfaced_verbatim() {
        let (status, code, message) = status_and_code(ExchangeError::InsufficientTokens.into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "INSUFFICIENT_TOKENS");
        assert_eq!(message, "insufficient tokens");
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (ExchangeError::SelfRequest, StatusCode::BAD_REQUEST),
            (
                ExchangeError::Validation("minutes must be positive".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ExchangeError::NotAuthorized("nope".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                ExchangeError::not_found("request", Uuid::nil()),
                StatusCode::NOT_FOUND,
            ),
            (
                ExchangeError::AlreadyResolved {
                    id: Uuid::nil(),
                    status: RequestStatus::Declined,
                },
                StatusCode::CONFLICT,
            ),
            (
                ExchangeError::AlreadyCompleted { id: Uuid::nil() },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            let (status, _, _) = status_and_code(err.into());
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn database_errors_are_sanitised() {
        let (status, code, message) = status_and_code(sqlx::Error::PoolTimedOut.into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert_eq!(message, "Internal server error");
    }
}
