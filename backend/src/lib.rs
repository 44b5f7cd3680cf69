//! Account authentication backend.
//!
//! Registration with email verification, credential login issuing a signed
//! bearer token, and a forgot/reset-password flow. The account service owns
//! every state transition on the Account entity; the axum layer is thin glue
//! around it.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod repositories;
pub mod services;
pub mod utils;
