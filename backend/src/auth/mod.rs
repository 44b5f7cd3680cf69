//! Authentication HTTP surface.
//!
//! Thin request-handling glue around the account lifecycle service:
//! request/response models, handlers, routes, and the bearer-token
//! middleware.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
