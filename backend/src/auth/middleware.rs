//! Middleware for protecting authenticated routes.
//!
//! Validates bearer tokens on incoming requests and makes the decoded
//! claims available to downstream handlers.

use crate::config::Config;
use crate::utils::jwt::JwtUtils;
use axum::{
    extract::Request,
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

/// JWT authentication middleware
pub async fn jwt_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Check if it's a Bearer token
    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = auth_header[7..].to_string();

    // The Config extension is layered onto the router in main
    let config = request
        .extensions()
        .get::<Config>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let jwt_utils = JwtUtils::new(config);

    match jwt_utils.validate_token(&token) {
        Ok(claims) => {
            // Add claims to request extensions for use in handlers
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}
