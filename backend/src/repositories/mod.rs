//! Database repositories for persistence operations.

pub mod account_repository;
