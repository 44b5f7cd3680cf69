//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle registration, email verification, login, and the
//! password-reset flow. They are designed to be integrated into the main
//! Axum router.

use crate::auth::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify/{token}", get(verify_email))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
}
