//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use libfanpost::error::ConfigError;
use libfanpost::FanpostError;
use serde_json::json;

/// An error response: status code plus `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FanpostError> for ApiError {
    fn from(error: FanpostError) -> Self {
        let status = match &error {
            FanpostError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FanpostError::Config(ConfigError::CredentialsMissing(_)) => StatusCode::BAD_REQUEST,
            FanpostError::NotFound(_) => StatusCode::NOT_FOUND,
            FanpostError::Conflict(_) => StatusCode::CONFLICT,
            FanpostError::Config(_) | FanpostError::Database(_) | FanpostError::Platform(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %error, "Request failed");
        }

        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
