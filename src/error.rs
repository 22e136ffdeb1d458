//! Server error types.
//!
//! Two families: [`ServerError`] covers the startup phase, where every
//! failure is fatal and the process exits non-zero before the listener
//! binds. [`HandlerError`] covers the serving phase, where failures map to
//! structured JSON responses and the process keeps running.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::artifact::ConfigError;

/// Fatal startup failures. None of these leave a partially registered
/// server listening.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The generated artifact is missing, unreadable, malformed, or
    /// incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Two GraphQL sub-servers share a name.
    #[error("a server with the name '{0}' has already been registered")]
    DuplicateServerName(String),

    /// A sub-server name cannot form a route path.
    #[error("invalid server name '{0}': names must be non-empty and must not contain '/', '{{' or '}}'")]
    InvalidServerName(String),

    /// A plugin failed during startup registration.
    #[error("{plugin} plugin registration failed: {source}")]
    Registration {
        /// Which plugin failed.
        plugin: &'static str,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// Plugins attempted to register out of order.
    #[error("plugin registration out of order: {0}")]
    RegistrationOrder(&'static str),

    /// The listener could not bind.
    #[error("could not bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The listener failed while serving.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid hook payload: ..."
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Request-phase errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The hook payload could not be interpreted.
    #[error("invalid hook payload: {0}")]
    InvalidPayload(String),

    /// The internal client was asked for an operation the API does not
    /// declare.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The internal client was asked to run an operation as the wrong kind.
    #[error("operation '{name}' is a {actual}, not a {expected}")]
    OperationKindMismatch {
        /// Operation name.
        name: String,
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind the API declares.
        actual: &'static str,
    },

    /// An upstream request (gateway engine or GraphQL sub-server) failed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidPayload(_) => 1001,
            Self::UnknownOperation(_) => 2001,
            Self::OperationKindMismatch { .. } => 1002,
            Self::Upstream(_) => 3002,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) | Self::OperationKindMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownOperation(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
