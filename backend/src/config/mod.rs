//! Central module for application-wide configuration settings.
//!
//! All configuration is loaded once at startup into an explicit [`Config`]
//! value that gets passed into the services; nothing below this layer reads
//! the environment directly.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expires_in_seconds: u64,
    pub verification_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub server_port: u16,
    pub frontend_url: String,
    /// When set, newly issued verification tokens are written to the server
    /// log so operators can complete the flow without outbound email. Off by
    /// default; never surfaced in any response.
    pub expose_verification_tokens: bool,
    email: Option<EmailConfig>,
}

/// SMTP settings for outbound mail. Absent when mail is not configured.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECONDS must be a valid number")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET not set")?;

        // Bearer tokens default to 7 days.
        let jwt_expires_in_seconds = env::var("JWT_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse::<u64>()
            .context("JWT_EXPIRES_IN_SECONDS must be a valid number")?;

        let verification_token_ttl_seconds = env::var("VERIFICATION_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse::<i64>()
            .context("VERIFICATION_TOKEN_TTL_SECONDS must be a valid number")?;

        let reset_token_ttl_seconds = env::var("RESET_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<i64>()
            .context("RESET_TOKEN_TTL_SECONDS must be a valid number")?;

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid number")?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let expose_verification_tokens = env::var("EXPOSE_VERIFICATION_TOKENS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let email = Self::email_from_env()?;

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            jwt_expires_in_seconds,
            verification_token_ttl_seconds,
            reset_token_ttl_seconds,
            server_port,
            frontend_url,
            expose_verification_tokens,
            email,
        })
    }

    /// Returns the SMTP configuration when all required variables are set.
    fn email_from_env() -> Result<Option<EmailConfig>> {
        let smtp_host = match env::var("SMTP_HOST") {
            Ok(host) => host,
            Err(_) => return Ok(None),
        };

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .context("SMTP_PORT must be a valid number")?;

        let smtp_username = env::var("SMTP_USERNAME").context("SMTP_USERNAME not set")?;
        let smtp_password = env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?;
        let from_email = env::var("EMAIL_FROM").context("EMAIL_FROM not set")?;
        let from_name = env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Mini Auth".to_string());

        Ok(Some(EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_email,
            from_name,
        }))
    }

    pub fn email_config(&self) -> Option<&EmailConfig> {
        self.email.as_ref()
    }

    /// Builds a config suitable for tests: in-memory database, no SMTP.
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 3,
            jwt_secret: "test-secret".to_string(),
            jwt_expires_in_seconds: 604_800,
            verification_token_ttl_seconds: 86_400,
            reset_token_ttl_seconds: 3_600,
            server_port: 0,
            frontend_url: "http://localhost:3000".to_string(),
            expose_verification_tokens: false,
            email: None,
        }
    }
}
