//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use floodtile_core::error::{ErrorKind, FloodtileError};

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// Returns the HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<FloodtileError> for ApiError {
    fn from(err: FloodtileError) -> Self {
        match err.kind() {
            ErrorKind::Request => ApiError::bad_request(err.to_string()),
            ErrorKind::Computation | ErrorKind::Config => {
                tracing::error!(error = %err, "Map computation failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_is_bad_request() {
        let err = ApiError::from(FloodtileError::MissingParameter("z".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains('z'));
    }

    #[test]
    fn test_computation_error_keeps_message() {
        let err = ApiError::from(FloodtileError::RemoteError {
            status: 403,
            message: "Earth Engine access denied".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("Earth Engine access denied"));
        assert_eq!(err.code, "INTERNAL_ERROR");
    }
}
