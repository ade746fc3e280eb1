//! API error types and responses.
//!
//! Every failure leaves the pipeline as an [`ApiError`]. Turning it into a
//! response attaches a [`ReportedError`] extension so the outer middleware can
//! log and count it without re-parsing the body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use sales_auth::AuthError;
use sales_core::Role;

/// Message returned to clients whose roles do not cover the route.
pub const FORBIDDEN_MESSAGE: &str = "you are not authorized for that action";

/// Message returned when the `Authorization` header has the wrong shape.
pub const MALFORMED_HEADER_MESSAGE: &str = "expected authorization header format: Bearer <token>";

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The `Authorization` header is missing or not `Bearer <token>`.
    #[error("{}", MALFORMED_HEADER_MESSAGE)]
    MalformedHeader,

    /// The presented token failed validation.
    #[error("{0}")]
    Unauthorized(AuthError),

    /// Authenticated, but no held role is in the required set.
    #[error("{}", FORBIDDEN_MESSAGE)]
    Forbidden {
        /// Roles carried by the token.
        held: Vec<Role>,
        /// Roles the route accepts.
        required: Vec<Role>,
    },

    /// A value the chain should have placed in the request is absent.
    #[error("{0}")]
    ContextMissing(&'static str),

    /// A downstream handler panicked.
    #[error("panic: {0}")]
    Panic(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// What the error middleware sees of a failed request.
///
/// Attached to the response extensions by [`ApiError::into_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    /// Short error kind, e.g. `forbidden`.
    pub kind: &'static str,
    /// Operator-facing detail, which may carry more than the client body.
    pub detail: String,
    /// Whether the failure means the service is mis-composed.
    pub shutdown: bool,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedHeader | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::ContextMissing(_) | Self::Panic(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error kind string for this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed_header",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::ContextMissing(_) => "context_missing",
            Self::Panic(_) => "panic",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::MalformedHeader | Self::Unauthorized(_) | Self::Forbidden { .. } => {
                self.to_string()
            }
            Self::ContextMissing(_) | Self::Panic(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
                    .canonical_reason()
                    .unwrap_or("internal server error")
                    .to_string()
            }
        }
    }

    /// Full detail for logs.
    fn detail(&self) -> String {
        match self {
            Self::Forbidden { held, required } => {
                format!("{FORBIDDEN_MESSAGE}: held {held:?}, required {required:?}")
            }
            other => other.to_string(),
        }
    }

    fn report(&self) -> ReportedError {
        ReportedError {
            kind: self.kind(),
            detail: self.detail(),
            shutdown: matches!(self, Self::ContextMissing(_)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.public_message(),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self.report());
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_validation_failure() {
            Self::Unauthorized(err)
        } else {
            tracing::error!(error = %err, "Auth internal error");
            Self::Internal("authentication service error".to_string())
        }
    }
}
