//! JWT token utilities for authentication.
//!
//! Provides bearer token creation and validation for logged-in accounts.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::ServiceError;

/// JWT claims binding the authenticated account's identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account ID
    pub sub: String,
    /// Username at the time of issuance
    pub username: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token issued at timestamp
    pub iat: usize,
}

/// JWT token utility for creating and validating tokens.
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in_seconds: u64,
}

impl JwtUtils {
    /// Create a new JwtUtils instance from the application config.
    pub fn new(config: &Config) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        JwtUtils {
            encoding_key,
            decoding_key,
            validation,
            expires_in_seconds: config.jwt_expires_in_seconds,
        }
    }

    /// Generate a signed, time-limited bearer token for an account.
    pub fn generate_token(
        &self,
        account_id: String,
        username: String,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in_seconds as i64);

        let claims = Claims {
            sub: account_id,
            username,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal(format!("Token generation failed: {}", e)))
    }

    /// Validate and decode a bearer token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|_| ServiceError::InvalidCredentials)
    }
}

impl Claims {
    pub fn account_id(&self) -> &str {
        &self.sub
    }

    /// Check if the token has expired.
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as usize;
        now > self.exp
    }
}
