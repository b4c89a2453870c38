//! Sync service error types with HTTP status code mapping.
//!
//! [`SyncError`] is the central error type. Persistence operations keep
//! it behind their best-effort boundary; the HTTP surface maps it to a
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::mysql::MySqlDatabaseError;

/// Server error numbers sent right before the server drops the session.
const SERVER_DISCONNECT_ERRORS: [u16; 3] = [
    1053, // ER_SERVER_SHUTDOWN
    1927, // ER_CONNECTION_KILLED
    4031, // ER_CLIENT_INTERACTION_TIMEOUT
];

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "participant not found: 0b0f...",
///     "details": null
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
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request             |
/// | 2000–2999 | Not Found       | 404 Not Found               |
/// | 3000–3999 | Server          | 500 Internal Server Error   |
/// | 5000–5999 | Storage         | 503 Service Unavailable     |
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration value is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Error reported by the MySQL driver.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Connecting to the database did not finish in time.
    #[error("database connect timed out after {0} s")]
    ConnectTimeout(u64),

    /// No live connection is held.
    #[error("database not connected")]
    NotConnected,

    /// A string is not a canonical hyphenated UUID.
    #[error("invalid participant identifier: {0}")]
    InvalidIdentifier(String),

    /// No stored record exists for the participant.
    #[error("participant not found: {0}")]
    ParticipantNotFound(uuid::Uuid),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidIdentifier(_) => 1002,
            Self::ParticipantNotFound(_) => 2001,
            Self::Config(_) => 3001,
            Self::Database(_) => 5001,
            Self::ConnectTimeout(_) => 5002,
            Self::NotConnected => 5003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) | Self::ConnectTimeout(_) | Self::NotConnected => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Returns `true` when the error means the connection itself is
    /// unusable and must be dropped before the next attempt.
    ///
    /// Besides transport failures this covers the error packets the server
    /// sends as it closes the session (idle timeout, `KILL`, shutdown).
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db
                .try_downcast_ref::<MySqlDatabaseError>()
                .is_some_and(|e| is_server_disconnect(e.number())),
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::WorkerCrashed
            ),
            Self::NotConnected | Self::ConnectTimeout(_) => true,
            _ => false,
        }
    }
}

/// Whether a MySQL server error number announces a closed session.
#[must_use]
pub(crate) fn is_server_disconnect(number: u16) -> bool {
    SERVER_DISCONNECT_ERRORS.contains(&number)
}

impl IntoResponse for SyncError {
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
