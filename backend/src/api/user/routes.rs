//! Defines the HTTP routes for user profile access.

use crate::api::user::handlers::profile;
use crate::auth::middleware::jwt_auth;
use axum::{Router, middleware, routing::get};

/// Creates the user router with all profile-related routes
pub fn user_router() -> Router {
    Router::new().route(
        "/profile",
        get(profile).layer(middleware::from_fn(jwt_auth)),
    )
}
