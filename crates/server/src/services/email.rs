//! Email service for sending one-time codes.
//!
//! Messages are rendered with Askama (HTML and plain text) and handed to a
//! transactional email API over HTTP. Without an API configured, codes are
//! written to the log so local signups still work.

use askama::Template;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use solarcast_core::{Email, OTP_VALIDITY_MINUTES};

use crate::config::MailConfig;

/// HTML template for one-time code email.
#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    subject: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

/// Plain text template for one-time code email.
#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    subject: &'a str,
    code: &'a str,
    validity_minutes: i64,
}

/// Why a code is being sent. Determines the subject line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    /// First code after signup.
    Signup,
    /// Replacement code requested from the verification screen.
    Resend,
    /// Code for the forgotten-password flow.
    PasswordReset,
}

impl OtpPurpose {
    /// Subject line for this kind of message.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Signup => "Verify your SolarPower-ML Account",
            Self::Resend => "Resend: Verify your SolarPower-ML Account",
            Self::PasswordReset => "SolarPower-ML Password Reset OTP",
        }
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Invalid API key or address.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// JSON body accepted by the email API.
#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Clone)]
struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    from: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<HttpTransport>,
}

impl EmailService {
    /// Create an email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &MailConfig) -> Result<Self, EmailError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| EmailError::InvalidConfig(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            transport: Some(HttpTransport {
                client,
                url: config.api_url.clone(),
                from: config.from.clone(),
            }),
        })
    }

    /// A service that logs codes instead of sending them.
    #[must_use]
    pub const fn log_only() -> Self {
        Self { transport: None }
    }

    /// Build from optional configuration, falling back to [`EmailService::log_only`].
    ///
    /// # Errors
    ///
    /// See [`EmailService::new`].
    pub fn from_config(config: Option<&MailConfig>) -> Result<Self, EmailError> {
        match config {
            Some(config) => Self::new(config),
            None => {
                tracing::warn!("Mail API not configured, one-time codes will be logged");
                Ok(Self::log_only())
            }
        }
    }

    /// Whether messages actually leave the process.
    #[must_use]
    pub const fn is_delivering(&self) -> bool {
        self.transport.is_some()
    }

    /// Send a one-time code.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or the API rejects the message.
    pub async fn send_otp(
        &self,
        to: &Email,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), EmailError> {
        let subject = purpose.subject();
        let (html, text) = render_otp(subject, code)?;

        let Some(transport) = &self.transport else {
            tracing::warn!(to = %to, subject = %subject, code = %code, "One-time code (mail not configured)");
            return Ok(());
        };

        let body = OutgoingEmail {
            from: &transport.from,
            to: to.as_str(),
            subject,
            html: &html,
            text: &text,
        };

        let response = transport
            .client
            .post(transport.url.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn render_otp(subject: &str, code: &str) -> Result<(String, String), EmailError> {
    let html = OtpEmailHtml {
        subject,
        code,
        validity_minutes: OTP_VALIDITY_MINUTES,
    }
    .render()?;
    let text = OtpEmailText {
        subject,
        code,
        validity_minutes: OTP_VALIDITY_MINUTES,
    }
    .render()?;
    Ok((html, text))
}

/// Generate a 6-digit one-time code.
#[must_use]
pub fn generate_otp_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_code_format() {
        let code = generate_otp_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_otp_code_range() {
        for _ in 0..100 {
            let code: u32 = generate_otp_code().parse().expect("valid number");
            assert!(code >= 100_000);
            assert!(code < 1_000_000);
        }
    }

    #[test]
    fn test_render_otp_contains_code_and_expiry() {
        let (html, text) = render_otp(OtpPurpose::Signup.subject(), "482913").unwrap();
        assert!(html.contains("<h2"));
        assert!(html.contains("482913"));
        assert!(html.contains("Verify your SolarPower-ML Account"));
        assert!(text.contains("Your OTP code is: 482913"));
        assert!(text.contains("expire in 5 minutes"));
    }

    #[test]
    fn test_subjects() {
        assert_eq!(
            OtpPurpose::Resend.subject(),
            "Resend: Verify your SolarPower-ML Account"
        );
        assert_eq!(
            OtpPurpose::PasswordReset.subject(),
            "SolarPower-ML Password Reset OTP"
        );
    }

    #[tokio::test]
    async fn test_log_only_send_succeeds() {
        let service = EmailService::log_only();
        assert!(!service.is_delivering());

        let to = Email::parse("ada@example.com").unwrap();
        service
            .send_otp(&to, "123456", OtpPurpose::PasswordReset)
            .await
            .unwrap();
    }
}
