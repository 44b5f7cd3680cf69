//! Data structures for authentication-related requests and responses.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Registration request payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"),
        custom(function = validate_username_chars)
    )]
    pub username: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Registration response: the public identity of the new, unverified account.
/// Never carries the verification token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response containing the bearer token and account info
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountInfo,
    pub expires_in: u64, // Token expiration in seconds
}

/// Account information returned in login and profile responses
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

/// Forgot-password request payload
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

/// Reset-password request payload; the token itself travels in the URL path.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Usernames are limited to letters, numbers, and underscores.
fn validate_username_chars(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_chars")
            .with_message("Username can only contain letters, numbers, and underscores".into()))
    }
}
