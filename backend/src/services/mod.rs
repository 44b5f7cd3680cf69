//! Module for core business logic services.

pub mod account_service;
pub mod notifier;
