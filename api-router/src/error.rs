use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::{error_id, AppError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    /// Payload carries the opaque error id, never the internal message.
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream store or webhook failure, payload is the opaque error id.
    #[error("Upstream service unavailable")]
    BadGateway(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::Auth(msg) => Self::Unauthorized(msg),
            AppError::StoreUnavailable(_) | AppError::WebhookUnavailable(_) => {
                let id = error_id();
                tracing::error!(error_id = %id, error = %err, "upstream dependency failed");
                Self::BadGateway(id)
            }
            _ => {
                let id = error_id();
                tracing::error!(error_id = %id, error = ?err, "internal error");
                Self::InternalError(id)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(id) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    status: "error".to_string(),
                    error_id: Some(id),
                },
            ),
            Self::BadGateway(id) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse {
                    error: "Upstream service unavailable".to_string(),
                    status: "error".to_string(),
                    error_id: Some(id),
                },
            ),
            Self::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                    error_id: None,
                },
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                    error_id: None,
                },
            ),
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                    error_id: None,
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn app_errors_map_to_the_right_variants() {
        let not_found = AppError::NotFound("job 'x'".to_string());
        assert!(matches!(ApiError::from(not_found), ApiError::NotFound(_)));

        let validation = AppError::Validation("missing or empty text".to_string());
        assert!(matches!(
            ApiError::from(validation),
            ApiError::ValidationError(_)
        ));

        let auth = AppError::Auth("not yours".to_string());
        assert!(matches!(ApiError::from(auth), ApiError::Unauthorized(_)));

        let store = AppError::StoreUnavailable("503".to_string());
        assert!(matches!(ApiError::from(store), ApiError::BadGateway(_)));

        let webhook = AppError::WebhookUnavailable("timeout".to_string());
        assert!(matches!(ApiError::from(webhook), ApiError::BadGateway(_)));

        let io = AppError::Io(std::io::Error::other("io error"));
        assert!(matches!(ApiError::from(io), ApiError::InternalError(_)));
    }

    #[test]
    fn response_status_codes() {
        assert_status_code(
            ApiError::InternalError("abcd1234".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::BadGateway("abcd1234".to_string()),
            StatusCode::BAD_GATEWAY,
        );
        assert_status_code(
            ApiError::ValidationError("bad input".to_string()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::NotFound("gone".to_string()),
            StatusCode::NOT_FOUND,
        );
        assert_status_code(
            ApiError::Unauthorized("nope".to_string()),
            StatusCode::UNAUTHORIZED,
        );
    }

    #[test]
    fn internal_errors_never_leak_their_message() {
        let api_error = ApiError::from(AppError::Internal("db password incorrect".to_string()));
        assert_eq!(api_error.to_string(), "Internal server error");
    }
}
