//! Global application error types and handlers.
//!
//! This module defines the error taxonomy used across the entire backend
//! and provides mechanisms for consistent error handling and response
//! formatting.

use thiserror::Error;

/// Which unique account field a registration collided with.
///
/// When both fields collide, email takes priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Email,
    Username,
}

impl ConflictField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictField::Email => "email",
            ConflictField::Username => "username",
        }
    }

    /// User-facing message for the duplicate-identity error.
    pub fn message(&self) -> &'static str {
        match self {
            ConflictField::Email => "Email already registered",
            ConflictField::Username => "Username already taken",
        }
    }
}

/// Service error covering every account-lifecycle failure mode.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Duplicate identity during registration, citing the colliding field.
    #[error("{}", .field.message())]
    Conflict { field: ConflictField },

    /// Unknown, already-consumed, or expired verification/reset token.
    /// The cases are deliberately indistinguishable.
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// Unknown email or wrong password. One error for both, so a login
    /// attempt cannot probe for account existence.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The password was correct but the email is not verified yet.
    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    /// Out-of-band delivery failed where the operation requires it.
    #[error("Notification failed: {message}")]
    NotificationFailed { message: String },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(field: ConflictField) -> Self {
        Self::Conflict { field }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn notification_failed(message: impl Into<String>) -> Self {
        Self::NotificationFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
