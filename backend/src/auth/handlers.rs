//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, email
//! verification, login, and the password-reset flow, parse request data,
//! and interact with the account service for core business logic.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::*;
use crate::config::Config;
use crate::services::account_service::AccountService;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::Json as ResponseJson,
};
use sqlx::SqlitePool;

/// Handle account registration request
#[axum::debug_handler]
pub async fn register(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<RegisterResponse>>), (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.register(payload).await {
        Ok(response) => Ok((
            StatusCode::CREATED,
            ResponseJson(ApiResponse::success(
                response,
                "Registration successful! Please verify your email.",
            )),
        )),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle email verification request
#[axum::debug_handler]
pub async fn verify_email(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Path(token): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.verify_email(&token).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::success(
            (),
            "Email verified successfully! You can now login.",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle login request
#[axum::debug_handler]
pub async fn login(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.login(payload).await {
        Ok(response) => Ok(ResponseJson(ApiResponse::success(
            response,
            "Login successful",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle forgot-password request
#[axum::debug_handler]
pub async fn forgot_password(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.forgot_password(payload).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::success(
            (),
            "Password reset email sent",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle reset-password request
#[axum::debug_handler]
pub async fn reset_password(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.reset_password(&token, payload).await {
        Ok(()) => Ok(ResponseJson(ApiResponse::success(
            (),
            "Password reset successfully! You can now login.",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}
