//! Error handling for the key pool service
//!
//! This module provides:
//! - RFC 7807 Problem Details responses for operator endpoints
//! - Verbatim passthrough of upstream rejections
//! - Structured logging with request IDs

pub mod types;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard error response format following RFC 7807 Problem Details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,

    /// Request ID for tracing
    pub request_id: Option<String>,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration validation failed: {message}")]
    ConfigValidation {
        message: String,
        field: Option<String>,
    },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String, line: Option<usize> },

    // Storage errors
    #[error("Storage persistence failed: {message}")]
    StoragePersistence { message: String },

    // Key pool
    #[error("No API keys available in pool")]
    NoKeysAvailable,

    #[error("Key rotation unavailable: pool holds {pool_size} key(s)")]
    RotationUnavailable { pool_size: usize },

    #[error("Exhausted retries with key rotation after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
        message: String,
    },

    #[error("Upstream rejected the request: {body}")]
    UpstreamRejected { status: Option<u16>, body: String },

    // HTTP and network errors
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Authentication
    #[error("Unauthorized")]
    Unauthorized,

    // System errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO operation failed: {operation} - {message}")]
    Io { operation: String, message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a new configuration validation error
    pub fn config_validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            field: field.map(Into::into),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            Self::ConfigParse { .. }
            | Self::InvalidRequest { .. }
            | Self::Serialization { .. }
            | Self::RotationUnavailable { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            Self::Unauthorized => StatusCode::UNAUTHORIZED,

            // 429 Too Many Requests
            Self::RetriesExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,

            // Upstream status passes through, transport failures become 502
            Self::UpstreamRejected { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),

            // 500 Internal Server Error
            Self::ConfigValidation { .. }
            | Self::StoragePersistence { .. }
            | Self::Internal { .. }
            | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            Self::HttpClient { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            Self::NoKeysAvailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type URI for RFC 7807 compliance
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigParse { .. } => {
                "https://gemini-key-pool.dev/errors/configuration"
            }
            Self::StoragePersistence { .. } => "https://gemini-key-pool.dev/errors/storage",
            Self::NoKeysAvailable | Self::RotationUnavailable { .. } => {
                "https://gemini-key-pool.dev/errors/key-pool"
            }
            Self::RetriesExhausted { .. } => "https://gemini-key-pool.dev/errors/rate-limit",
            Self::UpstreamRejected { .. } | Self::HttpClient { .. } => {
                "https://gemini-key-pool.dev/errors/upstream"
            }
            Self::Unauthorized => "https://gemini-key-pool.dev/errors/authentication",
            Self::InvalidRequest { .. } | Self::Serialization { .. } => {
                "https://gemini-key-pool.dev/errors/validation"
            }
            Self::Io { .. } | Self::Internal { .. } => "https://gemini-key-pool.dev/errors/internal",
        }
    }

    /// Get a human-readable title for the error
    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigParse { .. } => "Configuration Error",
            Self::StoragePersistence { .. } => "Storage Error",
            Self::NoKeysAvailable | Self::RotationUnavailable { .. } => "Key Pool Error",
            Self::RetriesExhausted { .. } => "Upstream Rate Limit Exceeded",
            Self::UpstreamRejected { .. } | Self::HttpClient { .. } => "Upstream Error",
            Self::Unauthorized => "Authentication Error",
            Self::InvalidRequest { .. } | Self::Serialization { .. } => "Validation Error",
            Self::Io { .. } | Self::Internal { .. } => "Internal Server Error",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self, request_id: Option<&str>) {
        let request_id = request_id.unwrap_or("unknown");

        if self.status_code().is_server_error() {
            error!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Application error occurred"
            );
        } else {
            warn!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        self.log(Some(&request_id));

        let status = self.status_code();

        // Upstream rejections with a real status go back to the caller untouched.
        if let Self::UpstreamRejected {
            status: Some(_),
            body,
        } = self
        {
            let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            let mut response = (status, body).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            return response;
        }

        let error_response = ErrorResponse {
            error_type: self.error_type().to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            instance: format!("/errors/{request_id}"),
            request_id: Some(request_id),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn pool_errors_map_to_expected_status() {
        assert_eq!(
            AppError::NoKeysAvailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::RotationUnavailable { pool_size: 1 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        let exhausted = AppError::RetriesExhausted {
            attempts: 3,
            last_status: Some(503),
            message: "overloaded".into(),
        };
        assert_eq!(exhausted.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(exhausted.to_string().contains("Exhausted retries with key rotation"));
    }

    #[test]
    fn upstream_rejection_keeps_upstream_status() {
        let rejected = AppError::UpstreamRejected {
            status: Some(400),
            body: "bad".into(),
        };
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);

        let transport = AppError::UpstreamRejected {
            status: None,
            body: "connection refused".into(),
        };
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn upstream_rejection_body_is_passed_through() {
        let body = r#"{"error":{"code":400,"message":"Invalid argument"}}"#;
        let response = AppError::UpstreamRejected {
            status: Some(400),
            body: body.to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, body.as_bytes());
    }

    #[tokio::test]
    async fn problem_details_body_for_pool_errors() {
        let response = AppError::NoKeysAvailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let problem: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(problem.status, 503);
        assert_eq!(problem.title, "Key Pool Error");
        assert!(problem.request_id.is_some());
    }
}
