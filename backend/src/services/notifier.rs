//! Out-of-band token delivery.
//!
//! The [`Notifier`] trait is the seam between the account lifecycle and the
//! email transport; [`EmailNotifier`] implements it over async SMTP.

use crate::config::{Config, EmailConfig};
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;

/// Delivers verification and reset tokens out-of-band. Either send may fail;
/// the caller decides whether that failure is fatal to the operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, email: &str, username: &str, token: &str)
    -> ServiceResult<()>;

    async fn send_password_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()>;
}

/// SMTP notifier sending multipart HTML+text emails.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
    frontend_url: String,
}

impl EmailNotifier {
    /// Creates a new EmailNotifier from the application config.
    ///
    /// Returns `None` when SMTP is not configured.
    pub fn from_config(config: &Config) -> ServiceResult<Option<Self>> {
        let Some(email_config) = config.email_config() else {
            return Ok(None);
        };

        let creds = Credentials::new(
            email_config.smtp_username.clone(),
            email_config.smtp_password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&email_config.smtp_host)
            .map_err(|e| ServiceError::internal(format!("Invalid SMTP host: {e}")))?
            .port(email_config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Some(Self {
            mailer,
            config: email_config.clone(),
            frontend_url: config.frontend_url.clone(),
        }))
    }

    /// Sends a generic email.
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> ServiceResult<()> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::internal(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_content.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_content.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::internal(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::notification_failed(format!("Failed to send email: {e}")))?;

        Ok(())
    }

    fn build_verification_html(&self, username: &str, verification_url: &str) -> String {
        format!(
            r#"
            <!DOCTYPE html>
            <html>
            <head>
                <meta charset="UTF-8">
                <title>Verify your email</title>
            </head>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #2c3e50;">Welcome!</h2>

                    <p>Hi {},</p>

                    <p>Thank you for registering! Please verify your email address by clicking the button below:</p>

                    <div style="text-align: center; margin: 30px 0;">
                        <a href="{}"
                           style="background-color: #3498db; color: white; padding: 12px 30px;
                                  text-decoration: none; border-radius: 5px; display: inline-block;">
                            Verify Email
                        </a>
                    </div>

                    <p>Or copy and paste this link into your browser:</p>
                    <p style="word-break: break-all; color: #7f8c8d;">{}</p>

                    <hr style="border: none; border-top: 1px solid #ecf0f1; margin: 30px 0;">

                    <p style="font-size: 12px; color: #7f8c8d;">
                        This link will expire in 24 hours. If you didn't create an account,
                        you can safely ignore this email.
                    </p>
                </div>
            </body>
            </html>
            "#,
            username, verification_url, verification_url
        )
    }

    fn build_verification_text(&self, username: &str, verification_url: &str) -> String {
        format!(
            r#"Welcome!

Hi {},

Thank you for registering! Please verify your email address by opening the link below:
{}

This link will expire in 24 hours. If you didn't create an account, you can safely ignore this email.
            "#,
            username, verification_url
        )
    }

    fn build_reset_html(&self, username: &str, reset_url: &str) -> String {
        format!(
            r#"
            <!DOCTYPE html>
            <html>
            <head>
                <meta charset="UTF-8">
                <title>Password reset request</title>
            </head>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #2c3e50;">Password Reset Request</h2>

                    <p>Hi {},</p>

                    <p>We received a request to reset your password. Click the button below to create a new password:</p>

                    <div style="text-align: center; margin: 30px 0;">
                        <a href="{}"
                           style="background-color: #e74c3c; color: white; padding: 12px 30px;
                                  text-decoration: none; border-radius: 5px; display: inline-block;">
                            Reset Password
                        </a>
                    </div>

                    <p>Or copy and paste this link into your browser:</p>
                    <p style="word-break: break-all; color: #7f8c8d;">{}</p>

                    <hr style="border: none; border-top: 1px solid #ecf0f1; margin: 30px 0;">

                    <p style="font-size: 12px; color: #7f8c8d;">
                        This link will expire in 1 hour. If you didn't request a password reset,
                        you can safely ignore this email and your password will remain unchanged.
                    </p>
                </div>
            </body>
            </html>
            "#,
            username, reset_url, reset_url
        )
    }

    fn build_reset_text(&self, username: &str, reset_url: &str) -> String {
        format!(
            r#"Password Reset Request

Hi {},

We received a request to reset your password. Open the link below to create a new password:
{}

This link will expire in 1 hour. If you didn't request a password reset, you can safely ignore this email and your password will remain unchanged.
            "#,
            username, reset_url
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_verification(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let verification_url = format!("{}/verify.html?token={}", self.frontend_url, token);

        let html = self.build_verification_html(username, &verification_url);
        let text = self.build_verification_text(username, &verification_url);

        self.send_email(email, "Verify Your Email - Mini Auth", &html, &text)
            .await
    }

    async fn send_password_reset(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let reset_url = format!("{}/reset-password.html?token={}", self.frontend_url, token);

        let html = self.build_reset_html(username, &reset_url);
        let text = self.build_reset_text(username, &reset_url);

        self.send_email(email, "Password Reset Request - Mini Auth", &html, &text)
            .await
    }
}
