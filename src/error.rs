//! Ledger error types with HTTP status code mapping.
//!
//! [`LedgerError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "malformed payload: missing field `compute_used`",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`LedgerError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                  |
/// |-----------|------------------|------------------------------|
/// | 1000–1999 | Validation       | 400 Bad Request              |
/// | 2000–2999 | State/Not Found  | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server           | 500 Internal Server Error    |
/// | 4000–4999 | Upstream/Gateway | 502 Bad Gateway              |
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Event name outside the recognized vocabulary.
    #[error("unknown event name: {0}")]
    UnknownEventName(String),

    /// Event payload missing a required key or holding an unparsable value.
    /// Always a producer bug, so it is rejected loudly rather than skipped.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Allocation source with the given id was not found.
    #[error("allocation source not found: {0}")]
    SourceNotFound(String),

    /// User with the given username was not found.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Instance with the given id was not found.
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Maintenance window with the given id was not found.
    #[error("maintenance window not found: {0}")]
    WindowNotFound(uuid::Uuid),

    /// A user with this username is already registered.
    #[error("user already registered: {0}")]
    DuplicateUser(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Allocation authority unreachable or returned a malformed response.
    #[error("authority error: {0}")]
    AuthorityError(String),

    /// Enforcement or notification collaborator failed.
    #[error("gateway failure: {0}")]
    GatewayFailure(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::UnknownEventName(_) => 1001,
            Self::MalformedPayload(_) => 1002,
            Self::InvalidRequest(_) => 1003,
            Self::SourceNotFound(_) => 2001,
            Self::UserNotFound(_) => 2002,
            Self::InstanceNotFound(_) => 2003,
            Self::WindowNotFound(_) => 2004,
            Self::DuplicateUser(_) => 2005,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::AuthorityError(_) => 4001,
            Self::GatewayFailure(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEventName(_) | Self::MalformedPayload(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::SourceNotFound(_)
            | Self::UserNotFound(_)
            | Self::InstanceNotFound(_)
            | Self::WindowNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateUser(_) => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthorityError(_) | Self::GatewayFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
