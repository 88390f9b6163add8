//! Error types for the gateway.
//!
//! Two layers of errors live here:
//! - [`GatewayError`] is what the orchestrator surfaces to the transport layer.
//!   Every variant maps to exactly one HTTP status.
//! - [`BackendError`] is what an [`Endpoint`](crate::Endpoint) returns. Its
//!   variants drive failover decisions, so adapters must classify failures
//!   at the source instead of leaving it to message inspection.

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error surfaced by the gateway to its callers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The request itself is malformed (bad model identifier, empty messages)
    #[error("Invalid request: {message}")]
    Client {
        /// Human readable description
        message: String,
    },

    /// No endpoint could serve the request
    #[error("No available endpoints: {message}")]
    Unavailable {
        /// Human readable description
        message: String,
    },

    /// Explicit rate limit signal towards the caller
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Suggested wait before retrying
        retry_after: Option<Duration>,
    },

    /// The caller went away or its deadline passed
    #[error("Request canceled")]
    Canceled,

    /// Every candidate reported that it lacks the requested capability
    #[error("Operation not supported: {operation}")]
    Unsupported {
        /// Name of the operation (e.g. "embeddings")
        operation: String,
    },

    /// State store failure, encoding failure, or an unclassified backend error
    #[error("Internal error: {message}")]
    Internal {
        /// Human readable description
        message: String,
    },
}

/// Coarse error classification, one per HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request
    Client,
    /// Nothing could serve the request
    Unavailable,
    /// Explicit rate limiting
    RateLimited,
    /// Caller canceled
    Canceled,
    /// Capability missing everywhere
    Unsupported,
    /// Anything else
    Internal,
}

impl GatewayError {
    /// Create a client error
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client { .. } => ErrorKind::Client,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Canceled => ErrorKind::Canceled,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// OpenAI-style error type string
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Client => "invalid_request_error",
            ErrorKind::Unavailable => "service_unavailable",
            ErrorKind::RateLimited => "rate_limit_error",
            ErrorKind::Canceled => "request_timeout",
            ErrorKind::Unsupported => "unsupported_operation",
            ErrorKind::Internal => "server_error",
        }
    }

    /// Whether the error ends a multi-model request immediately
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl ErrorKind {
    /// HTTP status code for this kind
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Client => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Canceled => StatusCode::REQUEST_TIMEOUT,
            Self::Unsupported => StatusCode::NOT_IMPLEMENTED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error reported by a backend endpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend is over quota or throughput for this model
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Backend message
        message: String,
        /// Backend-provided retry hint, if any
        retry_after: Option<Duration>,
    },

    /// The backend does not offer this operation
    #[error("Operation not supported: {operation}")]
    Unsupported {
        /// Name of the operation
        operation: String,
    },

    /// Any other failure
    #[error("Backend request failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Failed {
        /// HTTP status, when one was received
        status: Option<u16>,
        /// Backend message
        message: String,
    },
}

impl BackendError {
    /// Create a quota error without a retry hint
    pub fn quota(message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a generic failure
    pub fn failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Failed {
            status,
            message: message.into(),
        }
    }

    /// Whether this failure means the backend is out of capacity
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
