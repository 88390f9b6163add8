//! API error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{ErrorKind, GatewayError};
use serde_json::json;

/// Error rendered as `{"error":{"message","type","code"}}`
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Human readable message
    pub message: String,
    /// OpenAI-style error type
    pub error_type: &'static str,
    /// Machine readable code
    pub code: &'static str,
    /// Value for the `Retry-After` header, in seconds
    pub retry_after: Option<u64>,
}

impl ApiError {
    fn new(
        status: StatusCode,
        error_type: &'static str,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            error_type,
            code,
            retry_after: None,
        }
    }

    /// 400, malformed request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "invalid_request",
            message,
        )
    }

    /// 401, missing or wrong API key
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "invalid_api_key",
            message,
        )
    }

    /// 404, unknown resource
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "invalid_request_error",
            "model_not_found",
            message,
        )
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "internal_error",
            message,
        )
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        let code = match error.kind() {
            ErrorKind::Client => "invalid_request",
            ErrorKind::Unavailable => "no_available_endpoints",
            ErrorKind::RateLimited => "rate_limit_exceeded",
            ErrorKind::Canceled => "request_canceled",
            ErrorKind::Unsupported => "unsupported_operation",
            ErrorKind::Internal => "internal_error",
        };
        let retry_after = match &error {
            GatewayError::RateLimited { retry_after } => retry_after.map(|d| d.as_secs().max(1)),
            _ => None,
        };

        Self {
            status: error.status_code(),
            message: error.to_string(),
            error_type: error.error_type(),
            code,
            retry_after,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "type": self.error_type,
                "code": self.code,
            }
        });

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
