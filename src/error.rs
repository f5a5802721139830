//! Error handling module
//!
//! Wraps the subsystem errors for the HTTP collaborator and maps them to
//! status codes. The library itself surfaces the per-subsystem enums;
//! this type exists only at the transport edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::consumer_store::ConsumerStoreError;
use crate::crud::CrudError;
use crate::event_store::EventStoreError;
use crate::registry::RegistryError;

/// Application-wide Result type for the HTTP surface
pub type AppResult<T> = Result<T, AppError>;

/// Transport-edge error wrapper
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Crud(#[from] CrudError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ConsumerStore(#[from] ConsumerStoreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),

            AppError::EventStore(e) => match e {
                EventStoreError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
                EventStoreError::InvalidArgument(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_argument")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },

            AppError::Crud(e) => match e {
                CrudError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                CrudError::Deleted => (StatusCode::NOT_FOUND, "deleted"),
                CrudError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
                CrudError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },

            AppError::Registry(e) => match e {
                RegistryError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                RegistryError::Duplicate(_) => (StatusCode::CONFLICT, "already_registered"),
                RegistryError::InvalidArgument(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_argument")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },

            AppError::ConsumerStore(e) => match e {
                ConsumerStoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ConsumerStoreError::InvalidArgument(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_argument")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = AppError::Crud(CrudError::NotFound);
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);

        let err = AppError::Crud(CrudError::Duplicate {
            id: "u1".to_string(),
            version: 2,
        });
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);

        let err = AppError::Registry(RegistryError::InvalidArgument("bad".to_string()));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);

        let err = AppError::ConsumerStore(ConsumerStoreError::NotFound("c1".to_string()));
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }
}
