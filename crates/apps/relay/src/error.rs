//! HTTP error envelope
//!
//! Every failure leaves the service as `{error, details}` with the
//! upstream HTTP status when the core captured one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scores::SyncError;
use serde::Serialize;

/// Error body returned to callers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

/// API error carrying the response status alongside the envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: String,
}

impl ApiError {
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "validation_failed".to_string(),
            details: details.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::Validation { .. } => StatusCode::BAD_REQUEST,
            SyncError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            // Relay the upstream status when the core captured one.
            SyncError::Auth { .. } | SyncError::Fetch { .. } => err
                .upstream_status()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };
        Self {
            status,
            error: err.kind().to_string(),
            details: err.detail().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let err = ApiError::from(SyncError::validation("user_id is required"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "validation_failed");
    }

    #[test]
    fn test_fetch_relays_upstream_status() {
        let err = ApiError::from(SyncError::fetch(Some(429), "rate limited"));
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error, "fetch_failed");
    }

    #[test]
    fn test_fetch_without_status_falls_back_to_500() {
        let err = ApiError::from(SyncError::fetch(None, "connection refused"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error, "fetch_failed");
    }

    #[test]
    fn test_storage_maps_to_500() {
        let err = ApiError::from(SyncError::storage("disk full"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error, "db_failed");
    }

    #[test]
    fn test_envelope_serialization() {
        let body = ErrorBody {
            error: "fetch_failed".to_string(),
            details: "boom".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"fetch_failed","details":"boom"}"#);
    }
}
