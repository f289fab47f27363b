//! Edge error handling.
//!
//! Component errors are translated here, once, into a status code and a
//! `{"error": message}` body. Storage and predictor details are logged and
//! never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::predict::PredictError;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Unauthorized,

    // Server errors (5xx)
    InternalError,
    DatabaseError,
    PredictionFailed,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::PredictionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
            ErrorCode::PredictionFailed => "prediction_failed",
        }
    }
}

/// The error response envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Unauthorized error (401)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// The predictor timed out, failed or answered with garbage (500)
    pub fn prediction_failed() -> Self {
        Self::new(ErrorCode::PredictionFailed, "prediction failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(
            code = self.code.as_str(),
            status = self.status.as_u16(),
            "Request failed: {}",
            self.message
        );
        let body = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// -------------------------------------------------------------------------
// Conversions from component errors
// -------------------------------------------------------------------------

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::InvalidInput => ApiError::bad_request(err.to_string()),
            AuthError::DuplicateUsername => ApiError::bad_request(err.to_string()),
            AuthError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AuthError::Storage(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::database("db error")
            }
            AuthError::Hashing(e) => {
                tracing::error!("Password hashing error: {}", e);
                ApiError::internal("db error")
            }
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        if err.is_prediction_failure() {
            ApiError::prediction_failed()
        } else {
            ApiError::bad_request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::DatabaseError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::PredictionFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_error_translation() {
        let err = ApiError::from(AuthError::InvalidInput);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "username and password required");

        let err = ApiError::from(AuthError::DuplicateUsername);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "username taken");

        let err = ApiError::from(AuthError::InvalidCredentials);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "invalid credentials");
    }

    #[test]
    fn test_storage_details_are_hidden() {
        let err = ApiError::from(AuthError::Storage(sqlx::Error::PoolTimedOut));
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "db error");

        let err = ApiError::from(AuthError::Hashing("bad salt".to_string()));
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "db error");
    }

    #[test]
    fn test_error_code_names() {
        assert_eq!(ErrorCode::DatabaseError.as_str(), "database_error");
        assert_eq!(ErrorCode::InternalError.as_str(), "internal_error");
        assert_eq!(ErrorCode::PredictionFailed.as_str(), "prediction_failed");
    }

    #[test]
    fn test_predict_error_translation() {
        let err = ApiError::from(PredictError::InvalidInput);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "text is required");

        for failure in [
            PredictError::Timeout(Duration::from_secs(30)),
            PredictError::UpstreamStatus(502),
            PredictError::Transport("connection refused".to_string()),
            PredictError::InvalidResponse("eof".to_string()),
        ] {
            let err = ApiError::from(failure);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.message(), "prediction failed");
        }
    }
}
