//! Persisted data structures for the account lifecycle.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A registered identity with its credential and pending token state.
///
/// The two token pairs are invariantly set or cleared together: an account
/// either has both `verification_token` and `verification_token_expire` or
/// neither, and likewise for the reset pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token_expire: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expire: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert DTO for a new, unverified account.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_token: String,
    pub verification_token_expire: DateTime<Utc>,
}
