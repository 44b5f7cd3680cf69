//! Error handling utilities for API responses.
//!
//! Provides structured error responses and conversion between service-layer
//! errors and HTTP responses.
//!
//! # Response Format
//! Every endpoint returns the same JSON envelope containing:
//! - `success`: whether the request succeeded
//! - `message`: human-readable message
//! - `data`: payload (present on success)
//! - `error`: machine-readable error category
//!
//! # Error Handling Flow
//! 1. Service layer returns a domain-specific `ServiceError`
//! 2. `service_error_to_http` converts it to the appropriate HTTP response

use crate::errors::ServiceError;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Standard API response wrapper for all endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message
    pub message: String,
    /// Error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Request timestamp
    pub timestamp: String,
}

/// Error details for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error type identifier
    pub error_type: String,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>, error_type: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: message.into(),
            error: Some(ErrorDetails {
                error_type: error_type.into(),
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts ServiceError to the appropriate HTTP response with standard format
pub fn service_error_to_http(error: ServiceError) -> (StatusCode, String) {
    let (status, error_type, message) = match error {
        ServiceError::Validation { message } => {
            (StatusCode::BAD_REQUEST, "validation_error", message)
        }
        ServiceError::Conflict { field } => (
            StatusCode::BAD_REQUEST,
            "conflict",
            field.message().to_string(),
        ),
        ServiceError::InvalidOrExpiredToken => (
            StatusCode::BAD_REQUEST,
            "invalid_token",
            ServiceError::InvalidOrExpiredToken.to_string(),
        ),
        ServiceError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            ServiceError::InvalidCredentials.to_string(),
        ),
        ServiceError::NotVerified => (
            StatusCode::FORBIDDEN,
            "not_verified",
            ServiceError::NotVerified.to_string(),
        ),
        ServiceError::NotFound { entity, identifier } => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{} '{}' not found", entity, identifier),
        ),
        ServiceError::NotificationFailed { message } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "notification_failed", message)
        }
        ServiceError::Database { source } => {
            tracing::error!("Database error: {}", source);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Internal server error".to_string(),
            )
        }
        ServiceError::Internal { message } => {
            tracing::error!("Internal error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            )
        }
    };

    let error_response = ApiResponse::<()>::error(message, error_type);
    (status, serde_json::to_string(&error_response).unwrap())
}
