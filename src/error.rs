//! Error types for the relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::relay::message::BackendId;

/// Result type alias for the relay
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-level errors surfaced through the HTTP layer
#[derive(Error, Debug)]
pub enum AppError {
    /// Request rejected before any history mutation
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body for HTTP endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            Self::HttpClient(e) => {
                tracing::error!(error = %e, "HTTP client error");
                (StatusCode::INTERNAL_SERVER_ERROR, "HTTP_CLIENT_ERROR")
            }
            Self::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse {
            error: match self {
                Self::Validation(msg) => msg,
                other => other.to_string(),
            },
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Why a single backend call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure of one call to a remote backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct ProviderError {
    pub backend: BackendId,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(backend: BackendId, kind: ProviderErrorKind) -> Self {
        Self { backend, kind }
    }

    pub fn timeout(backend: BackendId) -> Self {
        Self::new(backend, ProviderErrorKind::Timeout)
    }

    pub fn status(backend: BackendId, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            backend,
            ProviderErrorKind::Status {
                status,
                body: body.into(),
            },
        )
    }

    pub fn malformed(backend: BackendId, reason: impl Into<String>) -> Self {
        Self::new(backend, ProviderErrorKind::Malformed(reason.into()))
    }

    /// Map a reqwest failure, keeping timeouts distinguishable
    pub fn from_reqwest(backend: BackendId, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(backend)
        } else {
            Self::new(backend, ProviderErrorKind::Transport(err.to_string()))
        }
    }

    /// Structured timeout, or any failure whose text mentions one
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Timeout)
            || self.to_string().to_lowercase().contains("timeout")
    }

    /// Whether repeating the identical request could plausibly succeed.
    ///
    /// Only used for diagnostics: the retry loop still retries every failure.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            ProviderErrorKind::Timeout | ProviderErrorKind::Transport(_) => true,
            ProviderErrorKind::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderErrorKind::Malformed(_) => false,
        }
    }
}
