use actix_web::http::StatusCode;
use actix_web::{error::ResponseError, HttpResponse};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

// Custom error handling
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Assistant error: {0}")]
    GatewayError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn message(&self) -> &str {
        match self {
            ApiError::ValidationError(msg)
            | ApiError::AuthError(msg)
            | ApiError::NotFoundError(msg)
            | ApiError::ConflictError(msg)
            | ApiError::GatewayError(msg)
            | ApiError::DatabaseError(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => {
                debug!("Unique constraint rejected write: {}", detail);
                ApiError::ConflictError("Email already exists".to_string())
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::DatabaseError(_) | ApiError::GatewayError(_) | ApiError::InternalError(_) => {
                error!("{} ({})", self, status);
            }
            ApiError::ValidationError(_) | ApiError::AuthError(_) | ApiError::ConflictError(_) => {
                warn!("{} ({})", self, status);
            }
            ApiError::NotFoundError(_) => {
                debug!("{} ({})", self, status);
            }
        }
        HttpResponse::build(status).json(json!({ "error": self.message() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFoundError(_) => StatusCode::NOT_FOUND,
            ApiError::ConflictError(_) => StatusCode::CONFLICT,
            ApiError::GatewayError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_status() {
        let cases = [
            (ApiError::ValidationError("x".into()), 400),
            (ApiError::AuthError("x".into()), 401),
            (ApiError::NotFoundError("x".into()), 404),
            (ApiError::ConflictError("x".into()), 409),
            (ApiError::GatewayError("x".into()), 500),
            (ApiError::DatabaseError("x".into()), 500),
            (ApiError::InternalError("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{}", err);
            assert_eq!(err.error_response().status().as_u16(), status);
        }
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let err: ApiError = StoreError::Conflict("users_email_key".into()).into();
        assert!(matches!(err, ApiError::ConflictError(_)));

        let err: ApiError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, ApiError::DatabaseError(_)));
    }
}
