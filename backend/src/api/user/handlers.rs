//! Handler functions for user profile endpoints.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::AccountInfo;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::utils::jwt::Claims;
use axum::{extract::Extension, http::StatusCode, response::Json as ResponseJson};
use sqlx::SqlitePool;

/// Get the authenticated account's profile
#[axum::debug_handler]
pub async fn profile(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<ResponseJson<ApiResponse<AccountInfo>>, (StatusCode, String)> {
    let service = match AccountService::new(&pool, &config) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match service.get_profile(claims.account_id()).await {
        Ok(info) => Ok(ResponseJson(ApiResponse::success(
            info,
            "Profile retrieved successfully",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}
