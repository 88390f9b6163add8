//! Bearer key authentication for the `/v1` routes.
//!
//! Only the SHA-256 digest of the configured key is kept in memory.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Authentication failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Missing credentials")]
    MissingCredentials,
    /// Token did not match the configured key
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "authentication_error",
                "code": self.error_code(),
            }
        });

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"api\", error=\"invalid_token\""),
        );
        response
    }
}

/// Static API key check; open when no key is configured
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuth {
    digest: Option<[u8; 32]>,
}

impl ApiKeyAuth {
    /// Require `key`, or nothing when `None`
    #[must_use]
    pub fn new(key: Option<&SecretString>) -> Self {
        Self {
            digest: key.map(|k| hash_api_key(k.expose_secret())),
        }
    }

    /// Accept every request
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether a key is required
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// Check the `Authorization` header
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(expected) = self.digest else {
            return Ok(());
        };

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        if hash_api_key(token) == expected {
            Ok(())
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }
}

fn hash_api_key(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(()) => {
            debug!(path = %request.uri().path(), "Request authenticated");
            next.run(request).await
        }
        Err(err) => {
            warn!(error = %err, path = %request.uri().path(), "Authentication failed");
            err.into_response()
        }
    }
}
