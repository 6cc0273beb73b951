//! Error types for the auth proxy

use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for the auth proxy
pub type Result<T> = std::result::Result<T, Error>;

/// Auth proxy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request body could not be parsed or is missing required fields
    #[error("{0}")]
    MalformedRequest(String),

    /// Requested permission scope is not in the issuance-valid set
    #[error("invalid permission scope: {0}")]
    InvalidScope(String),

    /// Authentication failure (bad LMS key, bad signature, expired token,
    /// tenant mismatch). The message is deliberately generic.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Permission evaluator denial; carries the mismatch reason
    #[error("{0}")]
    Forbidden(String),

    /// No tenant matches the request host
    #[error("Tenant not found")]
    TenantNotFound,

    /// Admin operation not implemented
    #[error("Not implemented")]
    NotImplemented,

    /// Admin endpoints require the dynamic tenant registry
    #[error("Multi-tenant mode not enabled")]
    AdminUnavailable,

    /// Upstream LRS failure (network error, timeout, non-HTTP response)
    #[error("LRS request failed")]
    Upstream(#[source] reqwest::Error),

    /// Tenant store backend failure
    #[error("Tenant store error: {0}")]
    Store(String),

    /// Token signing failure
    #[error("Token generation failed")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code this error maps to at the boundary.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) | Self::InvalidScope(_) | Self::AdminUnavailable => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::TenantNotFound => StatusCode::NOT_FOUND,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 5xx details stay in the logs, not on the wire.
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
