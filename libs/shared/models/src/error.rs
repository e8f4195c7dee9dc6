use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure the booking core can surface. None of them are fatal: each one
/// resolves to a retry or a message shown to the patient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// A step guard was not satisfied; no network call was made.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// No signed-in identity. The caller runs the sign-in flow and retries.
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Network, store or scheduler failure. State is preserved for a retry.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether repeating the same call unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Upstream(_) | AppError::AuthRequired(_))
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::AuthRequired(msg)
            | AppError::Upstream(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message().to_string();

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::debug!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::AuthRequired("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::Upstream("timeout".into()).is_retryable());
        assert!(AppError::AuthRequired("sign in".into()).is_retryable());
        assert!(!AppError::ValidationError("missing phone".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = AppError::NotFound("unknown service".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
