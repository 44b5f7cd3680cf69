//! End-to-end tests for the account lifecycle over an in-memory database.

use async_trait::async_trait;
use backend::auth::models::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
use backend::config::Config;
use backend::errors::{ConflictField, ServiceError, ServiceResult};
use backend::services::account_service::AccountService;
use backend::services::notifier::Notifier;
use backend::utils::jwt::JwtUtils;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};

/// Captures every notification instead of sending it, so tests can read the
/// tokens that would have gone out by email.
#[derive(Default)]
struct Outbox {
    verifications: Mutex<Vec<(String, String, String)>>,
    resets: Mutex<Vec<(String, String, String)>>,
}

impl Outbox {
    fn last_verification_token(&self) -> String {
        self.verifications
            .lock()
            .unwrap()
            .last()
            .expect("no verification email recorded")
            .2
            .clone()
    }

    fn last_reset_token(&self) -> String {
        self.resets
            .lock()
            .unwrap()
            .last()
            .expect("no reset email recorded")
            .2
            .clone()
    }
}

struct RecordingNotifier(Arc<Outbox>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        self.0.verifications.lock().unwrap().push((
            email.to_string(),
            username.to_string(),
            token.to_string(),
        ));
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        self.0.resets.lock().unwrap().push((
            email.to_string(),
            username.to_string(),
            token.to_string(),
        ));
        Ok(())
    }
}

/// Fails every send, standing in for an unreachable SMTP relay.
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_verification(&self, _: &str, _: &str, _: &str) -> ServiceResult<()> {
        Err(ServiceError::notification_failed("smtp down"))
    }

    async fn send_password_reset(&self, _: &str, _: &str, _: &str) -> ServiceResult<()> {
        Err(ServiceError::notification_failed("smtp down"))
    }
}

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn recording_service<'a>(
    pool: &'a SqlitePool,
    config: &Config,
    outbox: &Arc<Outbox>,
) -> AccountService<'a> {
    AccountService::with_notifier(
        pool,
        config,
        Some(Box::new(RecordingNotifier(outbox.clone()))),
    )
}

fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn full_account_lifecycle() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    // Register: unverified account, public identity returned.
    let registered = service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    assert_eq!(registered.username, "alice");
    assert_eq!(registered.email, "a@x.com");

    // Cannot log in before verification.
    let err = service
        .login(login_request("a@x.com", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotVerified));

    // Verify with the token that went out by email.
    let token = outbox.last_verification_token();
    service.verify_email(&token).await.unwrap();

    // Login now succeeds and issues a bearer token bound to the account.
    let login = service
        .login(login_request("a@x.com", "secret1"))
        .await
        .unwrap();
    assert_eq!(login.expires_in, config.jwt_expires_in_seconds);
    let claims = JwtUtils::new(&config).validate_token(&login.token).unwrap();
    assert_eq!(claims.account_id(), registered.user_id);
    assert_eq!(claims.username, "alice");

    // Forgot password then reset with the emailed token.
    service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap();
    let reset_token = outbox.last_reset_token();
    service
        .reset_password(
            &reset_token,
            ResetPasswordRequest {
                password: "newpass1".to_string(),
            },
        )
        .await
        .unwrap();

    // Old password no longer works, new one does.
    let err = service
        .login(login_request("a@x.com", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
    service
        .login(login_request("a@x.com", "newpass1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_email_reports_email_conflict() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();

    let err = service
        .register(register_request("bob", "a@x.com", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict {
            field: ConflictField::Email
        }
    ));
}

#[tokio::test]
async fn duplicate_username_reports_username_conflict() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();

    let err = service
        .register(register_request("alice", "b@x.com", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict {
            field: ConflictField::Username
        }
    ));
}

#[tokio::test]
async fn email_takes_priority_when_both_fields_collide() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();

    let err = service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict {
            field: ConflictField::Email
        }
    ));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();

    let wrong_password = service
        .login(login_request("a@x.com", "wrong"))
        .await
        .unwrap_err();
    let unknown_email = service
        .login(login_request("nobody@x.com", "secret1"))
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
    assert!(matches!(unknown_email, ServiceError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn wrong_password_on_unverified_account_is_invalid_credentials() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();

    // NotVerified is only reachable with valid credentials; a wrong
    // password must not reveal the account's verification state.
    let err = service
        .login(login_request("a@x.com", "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
}

#[tokio::test]
async fn verification_token_is_single_use() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    let token = outbox.last_verification_token();

    service.verify_email(&token).await.unwrap();
    let err = service.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn expired_verification_token_is_rejected() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    let token = outbox.last_verification_token();

    sqlx::query("UPDATE accounts SET verification_token_expire = ? WHERE email = ?")
        .bind(Utc::now() - Duration::hours(25))
        .bind("a@x.com")
        .execute(&pool)
        .await
        .unwrap();

    let err = service.verify_email(&token).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();
    service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap();
    let token = outbox.last_reset_token();

    sqlx::query("UPDATE accounts SET reset_token_expire = ? WHERE email = ?")
        .bind(Utc::now() - Duration::hours(2))
        .bind("a@x.com")
        .execute(&pool)
        .await
        .unwrap();

    let err = service
        .reset_password(
            &token,
            ResetPasswordRequest {
                password: "newpass1".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn second_forgot_password_invalidates_first_token() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();

    let forgot = ForgotPasswordRequest {
        email: "a@x.com".to_string(),
    };
    service.forgot_password(forgot).await.unwrap();
    let first_token = outbox.last_reset_token();

    service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap();
    let second_token = outbox.last_reset_token();
    assert_ne!(first_token, second_token);

    let err = service
        .reset_password(
            &first_token,
            ResetPasswordRequest {
                password: "newpass1".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));

    service
        .reset_password(
            &second_token,
            ResetPasswordRequest {
                password: "newpass1".to_string(),
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    let err = service
        .forgot_password(ForgotPasswordRequest {
            email: "nobody@x.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn registration_survives_notifier_failure() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let service = AccountService::with_notifier(&pool, &config, Some(Box::new(FailingNotifier)));

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE email = ?")
        .bind("a@x.com")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn failed_reset_notification_rolls_back_token() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());

    let service = recording_service(&pool, &config, &outbox);
    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();

    let failing = AccountService::with_notifier(&pool, &config, Some(Box::new(FailingNotifier)));
    let err = failing
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotificationFailed { .. }));

    // No half-issued reset state survives the failed send.
    let reset_token: Option<String> =
        sqlx::query_scalar("SELECT reset_token FROM accounts WHERE email = ?")
            .bind("a@x.com")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(reset_token.is_none());
}

#[tokio::test]
async fn email_is_case_normalized() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    let registered = service
        .register(register_request("alice", "Alice@X.com", "secret1"))
        .await
        .unwrap();
    assert_eq!(registered.email, "alice@x.com");

    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();
    service
        .login(login_request("ALICE@x.COM", "secret1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn verified_state_survives_password_reset() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    let token = outbox.last_verification_token();
    service.verify_email(&token).await.unwrap();

    // Reset flow does not touch verification state.
    service
        .forgot_password(ForgotPasswordRequest {
            email: "a@x.com".to_string(),
        })
        .await
        .unwrap();
    service
        .reset_password(
            &outbox.last_reset_token(),
            ResetPasswordRequest {
                password: "newpass1".to_string(),
            },
        )
        .await
        .unwrap();

    let is_verified: bool =
        sqlx::query_scalar("SELECT is_verified FROM accounts WHERE email = ?")
            .bind("a@x.com")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(is_verified);
}

#[tokio::test]
async fn profile_returns_account_info() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    let registered = service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    service
        .verify_email(&outbox.last_verification_token())
        .await
        .unwrap();

    let login = service
        .login(login_request("a@x.com", "secret1"))
        .await
        .unwrap();
    let claims = JwtUtils::new(&config).validate_token(&login.token).unwrap();

    let profile = service.get_profile(claims.account_id()).await.unwrap();
    assert_eq!(profile.id, registered.user_id);
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.email, "a@x.com");
    assert!(profile.is_verified);
}

#[tokio::test]
async fn verification_token_never_leaks_into_response() {
    let pool = setup_pool().await;
    let config = Config::for_tests();
    let outbox = Arc::new(Outbox::default());
    let service = recording_service(&pool, &config, &outbox);

    let registered = service
        .register(register_request("alice", "a@x.com", "secret1"))
        .await
        .unwrap();
    let token = outbox.last_verification_token();

    let serialized = serde_json::to_string(&registered).unwrap();
    assert!(!serialized.contains(&token));
}
