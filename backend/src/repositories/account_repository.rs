//! Database repository for account persistence.
//!
//! Handles all persistence operations for the Account entity. Token
//! redemption is a single conditional UPDATE so that two concurrent
//! redemptions of the same token cannot both succeed.

use crate::database::models::{Account, CreateAccount};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, is_verified, \
     verification_token, verification_token_expire, reset_token, reset_token_expire, \
     created_at, updated_at";

/// Repository for account database operations.
pub struct AccountRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Creates a new AccountRepository instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new account in the database.
    ///
    /// The account starts unverified with a pending verification token.
    /// Uniqueness violations surface as sqlx errors carrying the SQLite
    /// `UNIQUE constraint failed` message; the service layer maps them.
    pub async fn create_account(&self, account: CreateAccount) -> Result<Account> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();

        let sql = format!(
            "INSERT INTO accounts \
             (id, username, email, password_hash, is_verified, \
              verification_token, verification_token_expire, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(account.username)
            .bind(account.email)
            .bind(account.password_hash)
            .bind(false)
            .bind(account.verification_token)
            .bind(account.verification_token_expire)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(account)
    }

    /// Retrieves an account by its unique identifier.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }

    /// Retrieves an account by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?");

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }

    /// Retrieves an account matching either the email or the username.
    ///
    /// Email matches are ordered first so that when both fields collide the
    /// caller reports the email conflict.
    pub async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE email = ? OR username = ? \
             ORDER BY (email = ?) DESC \
             LIMIT 1"
        );

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .bind(username)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }

    /// Redeems a verification token in one conditional update.
    ///
    /// Marks the account verified and clears both verification fields, but
    /// only where the token matches and has not expired. Returns `None` when
    /// nothing matched (unknown, consumed, or expired token).
    pub async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>> {
        let sql = format!(
            "UPDATE accounts \
             SET is_verified = 1, \
                 verification_token = NULL, \
                 verification_token_expire = NULL, \
                 updated_at = ? \
             WHERE verification_token = ? AND verification_token_expire > ? \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(now)
            .bind(token)
            .bind(now)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }

    /// Stores a pending reset token, replacing any prior one.
    pub async fn set_reset_token(
        &self,
        account_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE accounts \
             SET reset_token = ?, reset_token_expire = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(account_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Clears a pending reset token without changing the password.
    ///
    /// Used to roll back issuance when the notification could not be sent.
    pub async fn clear_reset_token(&self, account_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE accounts \
             SET reset_token = NULL, reset_token_expire = NULL, updated_at = ? \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(account_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Redeems a reset token in one conditional update.
    ///
    /// Replaces the password hash and clears both reset fields, but only
    /// where the token matches and has not expired. Returns `None` when
    /// nothing matched.
    pub async fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>> {
        let sql = format!(
            "UPDATE accounts \
             SET password_hash = ?, \
                 reset_token = NULL, \
                 reset_token_expire = NULL, \
                 updated_at = ? \
             WHERE reset_token = ? AND reset_token_expire > ? \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(new_password_hash)
            .bind(now)
            .bind(token)
            .bind(now)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }
}
