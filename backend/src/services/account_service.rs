//! Account lifecycle business logic.
//!
//! Owns every state transition on the Account entity: registration with
//! email verification, login, and the forgot/reset-password flow, including
//! all opaque-token issuance and redemption rules.

use crate::auth::models::*;
use crate::config::Config;
use crate::database::models::{Account, CreateAccount};
use crate::errors::{ConflictField, ServiceError, ServiceResult};
use crate::repositories::account_repository::AccountRepository;
use crate::services::notifier::{EmailNotifier, Notifier};
use crate::utils::jwt::JwtUtils;
use crate::utils::token::generate_opaque_token;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use validator::Validate;

pub struct AccountService<'a> {
    /// Shared database connection pool
    pool: &'a SqlitePool,
    jwt_utils: JwtUtils,
    config: Config,
    notifier: Option<Box<dyn Notifier>>,
}

impl<'a> AccountService<'a> {
    /// Creates a new AccountService instance.
    ///
    /// Builds the SMTP notifier when mail is configured; without it the
    /// service still runs, falling back to log-only behavior where the
    /// operation allows.
    pub fn new(pool: &'a SqlitePool, config: &Config) -> ServiceResult<Self> {
        let notifier = match EmailNotifier::from_config(config) {
            Ok(Some(notifier)) => {
                tracing::info!("Email notifier initialized");
                Some(Box::new(notifier) as Box<dyn Notifier>)
            }
            Ok(None) => {
                tracing::warn!("Email configuration not found. Email notifications disabled");
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize email notifier: {}. Email notifications disabled",
                    e
                );
                None
            }
        };

        Ok(Self::with_notifier(pool, config, notifier))
    }

    /// Creates an AccountService with an explicit notifier. Used by tests to
    /// substitute recording or failing notifiers.
    pub fn with_notifier(
        pool: &'a SqlitePool,
        config: &Config,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Self {
        AccountService {
            pool,
            jwt_utils: JwtUtils::new(config),
            config: config.clone(),
            notifier,
        }
    }

    /// Registers a new account in unverified state.
    ///
    /// Issues a 24-hour verification token and hands it to the notifier. A
    /// failed send does not abort registration; the account is created and
    /// the failure is logged for operators.
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<RegisterResponse> {
        Self::validate_request(&request)?;

        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);

        let repo = AccountRepository::new(self.pool);

        // Pre-check so the response can cite the colliding field; the unique
        // constraints below remain the authority under concurrency.
        if let Some(existing) = repo.find_by_email_or_username(&email, &username).await? {
            let field = if existing.email == email {
                ConflictField::Email
            } else {
                ConflictField::Username
            };
            return Err(ServiceError::conflict(field));
        }

        let verification_token = generate_opaque_token();
        let verification_token_expire =
            Utc::now() + Duration::seconds(self.config.verification_token_ttl_seconds);

        let password_hash = Self::hash_password(&request.password)?;

        let account = repo
            .create_account(CreateAccount {
                username: username.clone(),
                email: email.clone(),
                password_hash,
                verification_token: verification_token.clone(),
                verification_token_expire,
            })
            .await
            .map_err(|e| {
                let error_msg = e.to_string();
                if error_msg.contains("UNIQUE constraint failed: accounts.email") {
                    ServiceError::conflict(ConflictField::Email)
                } else if error_msg.contains("UNIQUE constraint failed: accounts.username") {
                    ServiceError::conflict(ConflictField::Username)
                } else {
                    ServiceError::Database { source: e }
                }
            })?;

        self.try_send_verification(&account, &verification_token)
            .await;

        if self.config.expose_verification_tokens {
            // Operator fallback for environments without outbound mail. The
            // token never appears in the HTTP response.
            tracing::info!(
                "Verification token for {}: {} ({}/verify.html?token={})",
                account.email,
                verification_token,
                self.config.frontend_url,
                verification_token
            );
        }

        Ok(RegisterResponse {
            user_id: account.id,
            username: account.username,
            email: account.email,
        })
    }

    /// Redeems a verification token, marking the account verified.
    ///
    /// Unknown, already-consumed, and expired tokens are indistinguishable:
    /// all yield `InvalidOrExpiredToken`. Redemption is a single conditional
    /// update, so concurrent redemptions of one token cannot both succeed.
    pub async fn verify_email(&self, token: &str) -> ServiceResult<()> {
        let repo = AccountRepository::new(self.pool);

        let account = repo
            .consume_verification_token(token, Utc::now())
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        tracing::info!("Email verified for account {}", account.id);
        Ok(())
    }

    /// Authenticates an account and issues a bearer token.
    ///
    /// Unknown email and wrong password produce the same error. An
    /// unverified account with the correct password gets `NotVerified`
    /// instead, so the password is checked before the verification flag.
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        Self::validate_request(&request)?;

        let email = normalize_email(&request.email);

        let repo = AccountRepository::new(self.pool);
        let Some(account) = repo.find_by_email(&email).await? else {
            // Burn an equivalent bcrypt round so an unknown email costs the
            // same as a wrong password.
            let _ = Self::hash_password(&request.password);
            return Err(ServiceError::InvalidCredentials);
        };

        if !Self::verify_password(&request.password, &account.password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }

        if !account.is_verified {
            return Err(ServiceError::NotVerified);
        }

        let token = self
            .jwt_utils
            .generate_token(account.id.clone(), account.username.clone())?;

        Ok(LoginResponse {
            token,
            user: account_info(account),
            expires_in: self.config.jwt_expires_in_seconds,
        })
    }

    /// Starts a password reset by issuing a 1-hour reset token.
    ///
    /// A pending reset token is overwritten, invalidating the prior one.
    /// Unlike registration, a failed send is fatal here: the token is rolled
    /// back so no usable pending token survives.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ServiceResult<()> {
        Self::validate_request(&request)?;

        let email = normalize_email(&request.email);

        let repo = AccountRepository::new(self.pool);
        let account = repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", &email))?;

        let reset_token = generate_opaque_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.reset_token_ttl_seconds);

        repo.set_reset_token(&account.id, &reset_token, expires_at)
            .await?;

        let send_result = match &self.notifier {
            Some(notifier) => {
                notifier
                    .send_password_reset(&account.email, &account.username, &reset_token)
                    .await
            }
            None => Err(ServiceError::notification_failed(
                "Email notifier not configured",
            )),
        };

        if let Err(e) = send_result {
            tracing::error!(
                "Failed to send password reset email to {}: {}",
                account.email,
                e
            );
            repo.clear_reset_token(&account.id).await?;
            return Err(ServiceError::notification_failed(
                "Could not send password reset email",
            ));
        }

        tracing::info!("Password reset email sent to {}", account.email);
        Ok(())
    }

    /// Redeems a reset token, replacing the stored password hash.
    ///
    /// Same single-conditional-update rule as verification: misses of any
    /// kind yield `InvalidOrExpiredToken`.
    pub async fn reset_password(
        &self,
        token: &str,
        request: ResetPasswordRequest,
    ) -> ServiceResult<()> {
        Self::validate_request(&request)?;

        let password_hash = Self::hash_password(&request.password)?;

        let repo = AccountRepository::new(self.pool);
        let account = repo
            .consume_reset_token(token, &password_hash, Utc::now())
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        tracing::info!("Password reset for account {}", account.id);
        Ok(())
    }

    /// Retrieves the public account info for an authenticated account.
    pub async fn get_profile(&self, account_id: &str) -> ServiceResult<AccountInfo> {
        let repo = AccountRepository::new(self.pool);
        let account = repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", account_id))?;

        Ok(account_info(account))
    }

    /// Attempts to send the verification email, logging but not failing the
    /// registration when the notifier is unavailable or the send fails.
    async fn try_send_verification(&self, account: &Account, token: &str) {
        match &self.notifier {
            Some(notifier) => {
                match notifier
                    .send_verification(&account.email, &account.username, token)
                    .await
                {
                    Ok(_) => {
                        tracing::info!("Verification email sent to {}", account.email);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to send verification email to {}: {}",
                            account.email,
                            e
                        );
                    }
                }
            }
            None => {
                tracing::warn!(
                    "Email notifier not configured. Verification email not sent to {}",
                    account.email
                );
            }
        }
    }

    /// Flattens validator field errors into a single validation error.
    fn validate_request(request: &impl Validate) -> ServiceResult<()> {
        if let Err(validation_errors) = request.validate() {
            let error_messages: Vec<String> = validation_errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |error| {
                        format!(
                            "{}: {}",
                            field,
                            error.message.as_ref().unwrap_or(&"Invalid value".into())
                        )
                    })
                })
                .collect();

            return Err(ServiceError::validation(error_messages.join(", ")));
        }
        Ok(())
    }

    /// Function to hash a password before storing in database
    fn hash_password(password: &str) -> ServiceResult<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| ServiceError::internal(format!("Password hashing failed: {}", e)))
    }

    /// Function to verify a password against the stored hash
    fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
        verify(password, hash)
            .map_err(|e| ServiceError::internal(format!("Password verification failed: {}", e)))
    }
}

/// Lowercases and trims an email for storage and lookup.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn account_info(account: Account) -> AccountInfo {
    AccountInfo {
        id: account.id,
        username: account.username,
        email: account.email,
        is_verified: account.is_verified,
    }
}
