//! Main entry point for the authentication backend.
//!
//! This file initializes the Axum web server, sets up the database
//! connection, and registers all API routes and middleware.

use axum::{Extension, Router, response::Json, routing::get};
use backend::api;
use backend::api::common::ApiResponse;
use backend::auth;
use backend::config::Config;
use backend::database::Database;
use tracing::info;
use tracing_subscriber::fmt::init;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;
    let pool = db.pool().clone();

    let app = Router::new()
        .route("/", get(root_handler))
        .nest("/api/auth", auth::routes::auth_router())
        .nest("/api/user", api::user::routes::user_router())
        .layer(Extension(pool))
        .layer(Extension(config.clone()));

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Starting auth server on port {}", config.server_port);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": "Auth Backend",
            "version": "0.1.0"
        }),
        "Welcome to the Auth API",
    ))
}
