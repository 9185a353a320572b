use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::storage::StorageError;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<T, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        }),
    )
}

pub fn internal_error() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", "INTERNAL_ERROR")
}

/// Translate a storage failure into its HTTP response
pub fn storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::Rule(rule) => {
            let status = if rule.is_forbidden() {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::BAD_REQUEST
            };
            api_error(status, rule.to_string(), rule.code())
        }
        e if e.is_not_found() => api_error(StatusCode::NOT_FOUND, e.to_string(), "NOT_FOUND"),
        StorageError::Duplicate(message) => api_error(StatusCode::CONFLICT, message, "CONFLICT"),
        e => {
            error!("Storage error: {}", e);
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ylab_core::MarketError;

    #[test]
    fn test_rule_violations() {
        let (status, Json(body)) = storage_error(MarketError::InsufficientCredit.into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Insufficient credit");
        assert_eq!(body.code, "INSUFFICIENT_CREDIT");

        let (status, Json(body)) = storage_error(MarketError::NotOwner.into());
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Not authorized");
    }

    #[test]
    fn test_not_found_and_conflict() {
        let (status, Json(body)) = storage_error(StorageError::ResourceNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Resource not found");

        let (status, Json(body)) = storage_error(StorageError::Duplicate("Email already taken".into()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Email already taken");
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let (status, Json(body)) = storage_error(StorageError::Corrupt("status 'x'".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal error");
    }
}
