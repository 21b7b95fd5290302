//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
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
///     "code": 4001,
///     "message": "event location is 4.17 km from the board center, outside the allowed radius",
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
    /// Numeric error code (see code ranges on [`GatewayError`]).
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
/// | Range     | Category        | HTTP Status               |
/// |-----------|-----------------|---------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request           |
/// | 2000–2999 | Not Found       | 404 Not Found             |
/// | 3000–3999 | Server          | 500 Internal Server Error |
/// | 4000–4999 | Domain          | 403 Forbidden             |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(i64),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Event location falls outside the configured geofence.
    #[error("event location is {distance_km:.2} km from the board center, outside the allowed radius")]
    OutsideGeofence {
        /// Distance from the geofence center in kilometres.
        distance_km: f64,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::EventNotFound(_) => 2001,
            Self::PersistenceError(_) => 3001,
            Self::OutsideGeofence { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound(_) => StatusCode::NOT_FOUND,
            Self::PersistenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OutsideGeofence { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GatewayError {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_by_category() {
        assert_eq!(
            GatewayError::EventNotFound(7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::OutsideGeofence { distance_km: 4.2 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::PersistenceError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(GatewayError::EventNotFound(1).error_code(), 2001);
        assert_eq!(
            GatewayError::OutsideGeofence { distance_km: 3.0 }.error_code(),
            4001
        );
    }
}
