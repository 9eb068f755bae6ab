//! Authentication service.
//!
//! Password accounts verified by an emailed one-time code:
//!
//! 1. `signup` stores an unverified user with a pending code and emails it
//! 2. `verify_signup` consumes the code and marks the user verified
//! 3. `signin` checks the password of a verified user
//!
//! Forgotten passwords reuse the same code slot: `start_password_reset`
//! issues a code, `verify_reset_code` checks it, `reset_password` consumes it.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use sqlx::PgPool;

use solarcast_core::{Email, OneTimeCode, OtpError, UserId};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::User;
use crate::services::email::{EmailService, OtpPurpose, generate_otp_code};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Body of `POST /api/signup`.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub fullname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phonenumber: Option<String>,
}

/// Body of `POST /api/signup/verify/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub otp: Option<String>,
}

/// Body of `POST /api/signin`.
#[derive(Debug, Default, Deserialize)]
pub struct SigninRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
}

/// Body of requests that only carry an email.
#[derive(Debug, Default, Deserialize)]
pub struct EmailRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

/// Body of the password reset verify and reset requests.
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub otp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: Option<String>,
}

/// Authentication service.
///
/// Handles registration, email verification, login and password reset.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    email: &'a EmailService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self {
            users: UserRepository::new(pool),
            email,
        }
    }

    // =========================================================================
    // Signup
    // =========================================================================

    /// Register a user and email them a verification code.
    ///
    /// An unverified account with the same email is replaced.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingSignupFields`, `InvalidEmail` or
    /// `WeakPassword` for bad input, `UserAlreadyExists` if a verified
    /// account holds the email, and `OtpEmailFailed` if delivery fails.
    pub async fn signup(&self, req: &SignupRequest) -> Result<User, AuthError> {
        let (Some(fullname), Some(email), Some(password)) = (
            non_blank(req.fullname.as_deref()),
            non_blank(req.email.as_deref()),
            req.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::MissingSignupFields);
        };

        let email = Email::parse(email)?;
        validate_password(password)?;

        if let Some(existing) = self.users.get_by_email(&email).await?
            && existing.is_verified
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let otp = issue_otp()?;

        let user = self
            .users
            .replace_unverified(&NewUser {
                fullname,
                email: &email,
                password_hash: &password_hash,
                phonenumber: non_blank(req.phonenumber.as_deref()),
                otp: &otp,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered, awaiting verification");

        self.email
            .send_otp(&user.email, otp.code(), OtpPurpose::Signup)
            .await
            .map_err(AuthError::OtpEmailFailed)?;

        Ok(user)
    }

    /// Issue and email a fresh verification code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUserId`, `UserNotFound`, `AlreadyVerified`,
    /// or `OtpResendFailed` if delivery fails.
    pub async fn resend_otp(&self, raw_id: &str) -> Result<(), AuthError> {
        let user = self.unverified_user(raw_id).await?;

        let otp = issue_otp()?;
        self.users.set_otp(user.id, &otp).await?;

        self.email
            .send_otp(&user.email, otp.code(), OtpPurpose::Resend)
            .await
            .map_err(AuthError::OtpResendFailed)?;

        tracing::info!(user_id = %user.id, "Verification code resent");
        Ok(())
    }

    /// Consume a verification code and mark the user verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OtpRequired`, `InvalidUserId`, `UserNotFound`,
    /// `AlreadyVerified`, `NoOtp`, `SignupOtpExpired` or `InvalidOtp`.
    pub async fn verify_signup(&self, raw_id: &str, req: &VerifyRequest) -> Result<User, AuthError> {
        let candidate = non_blank(req.otp.as_deref()).ok_or(AuthError::OtpRequired)?;
        let user = self.unverified_user(raw_id).await?;

        let otp = user.otp.as_ref().ok_or(AuthError::NoOtp)?;
        otp.verify(candidate, Utc::now()).map_err(|e| match e {
            OtpError::Expired => AuthError::SignupOtpExpired,
            OtpError::Mismatch | OtpError::Malformed => AuthError::InvalidOtp,
        })?;

        let user = self.users.mark_verified(user.id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    async fn unverified_user(&self, raw_id: &str) -> Result<User, AuthError> {
        let id: UserId = raw_id.parse()?;
        let user = self
            .users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        Ok(user)
    }

    // =========================================================================
    // Signin
    // =========================================================================

    /// Log in with email and password.
    ///
    /// Signing in to an unverified account deletes it; the user has to sign
    /// up again.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials`, `UnknownAccount`,
    /// `EmailNotVerified` or `InvalidCredentials`.
    pub async fn signin(&self, req: &SigninRequest) -> Result<User, AuthError> {
        let (Some(email), Some(password)) = (
            non_blank(req.email.as_deref()),
            req.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::MissingCredentials);
        };

        let user = self
            .find_by_raw_email(email)
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        if !user.is_verified {
            self.users.delete(user.id).await?;
            tracing::info!(user_id = %user.id, "Unverified account removed on signin");
            return Err(AuthError::EmailNotVerified);
        }

        verify_password(password, &user.password_hash)?;

        tracing::info!(user_id = %user.id, "User signed in");
        Ok(user)
    }

    /// Delete the unverified account holding an email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailRequired` or `NoUnverifiedUser`.
    pub async fn delete_unverified(&self, req: &EmailRequest) -> Result<(), AuthError> {
        let raw = non_blank(req.email.as_deref()).ok_or(AuthError::EmailRequired)?;

        let Ok(email) = Email::parse(raw) else {
            return Err(AuthError::NoUnverifiedUser);
        };

        if !self.users.delete_unverified_by_email(&email).await? {
            return Err(AuthError::NoUnverifiedUser);
        }
        Ok(())
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue and email a password reset code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailRequired`, `ResetUserNotFound` or
    /// `OtpEmailFailed`.
    pub async fn start_password_reset(&self, req: &EmailRequest) -> Result<(), AuthError> {
        let raw = non_blank(req.email.as_deref()).ok_or(AuthError::EmailRequired)?;
        let user = self
            .find_by_raw_email(raw)
            .await?
            .ok_or(AuthError::ResetUserNotFound)?;

        let otp = issue_otp()?;
        self.users.set_otp(user.id, &otp).await?;

        self.email
            .send_otp(&user.email, otp.code(), OtpPurpose::PasswordReset)
            .await
            .map_err(AuthError::OtpEmailFailed)?;

        tracing::info!(user_id = %user.id, "Password reset code sent");
        Ok(())
    }

    /// Check a password reset code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailAndOtpRequired`, `UserNotFound`,
    /// `ResetOtpExpired` or `InvalidOtp`.
    pub async fn verify_reset_code(&self, req: &ResetRequest) -> Result<(), AuthError> {
        self.reset_candidate(req).await.map(|_| ())
    }

    /// Set a new password after checking the reset code, then clear it.
    ///
    /// # Errors
    ///
    /// As [`AuthService::verify_reset_code`], plus `PasswordRequired` and
    /// `WeakPassword`.
    pub async fn reset_password(&self, req: &ResetRequest) -> Result<(), AuthError> {
        let user = self.reset_candidate(req).await?;

        let password = req
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::PasswordRequired)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        self.users
            .update_password(user.id, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    async fn reset_candidate(&self, req: &ResetRequest) -> Result<User, AuthError> {
        let (Some(email), Some(candidate)) = (
            non_blank(req.email.as_deref()),
            non_blank(req.otp.as_deref()),
        ) else {
            return Err(AuthError::EmailAndOtpRequired);
        };

        let user = self
            .find_by_raw_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        check_reset_code(user.otp.as_ref(), candidate)?;
        Ok(user)
    }

    /// Look up by a raw email; a malformed address matches nobody.
    async fn find_by_raw_email(&self, raw: &str) -> Result<Option<User>, AuthError> {
        match Email::parse(raw) {
            Ok(email) => Ok(self.users.get_by_email(&email).await?),
            Err(_) => Ok(None),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Reset codes are compared before expiry is considered.
fn check_reset_code(otp: Option<&OneTimeCode>, candidate: &str) -> Result<(), AuthError> {
    let otp = otp
        .filter(|otp| otp.matches(candidate))
        .ok_or(AuthError::InvalidOtp)?;
    if otp.is_expired(Utc::now()) {
        return Err(AuthError::ResetOtpExpired);
    }
    Ok(())
}

fn issue_otp() -> Result<OneTimeCode, AuthError> {
    OneTimeCode::issue(generate_otp_code(), Utc::now()).map_err(AuthError::OtpGeneration)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accept strings and numbers (codes are often sent as JSON numbers).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_against_garbage_hash() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_code_without_pending_code_is_invalid() {
        assert!(matches!(
            check_reset_code(None, "123456"),
            Err(AuthError::InvalidOtp)
        ));
    }

    #[test]
    fn test_reset_code_expired_and_mismatch() {
        let stale = OneTimeCode::issue("123456", Utc::now() - Duration::minutes(10)).unwrap();
        assert!(matches!(
            check_reset_code(Some(&stale), "123456"),
            Err(AuthError::ResetOtpExpired)
        ));

        let fresh = OneTimeCode::issue("123456", Utc::now()).unwrap();
        assert!(matches!(
            check_reset_code(Some(&fresh), "654321"),
            Err(AuthError::InvalidOtp)
        ));
        assert!(check_reset_code(Some(&fresh), "123456").is_ok());
    }

    #[test]
    fn test_wrong_reset_code_after_expiry_is_invalid() {
        let stale = OneTimeCode::issue("123456", Utc::now() - Duration::minutes(10)).unwrap();
        assert!(matches!(
            check_reset_code(Some(&stale), "654321"),
            Err(AuthError::InvalidOtp)
        ));
    }

    #[test]
    fn test_issue_otp_expires_in_five_minutes() {
        let otp = issue_otp().unwrap();
        let remaining = otp.expires_at() - Utc::now();
        assert!(remaining <= Duration::minutes(5));
        assert!(remaining > Duration::minutes(4));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ada ")), Some("ada"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_requests_accept_numeric_codes() {
        let req: ResetRequest =
            serde_json::from_str(r#"{"email": "ada@example.com", "otp": 482913}"#).unwrap();
        assert_eq!(req.otp.as_deref(), Some("482913"));
        assert!(req.password.is_none());
    }

    #[test]
    fn test_requests_tolerate_null_and_missing_fields() {
        let req: SignupRequest = serde_json::from_str(r#"{"fullname": null}"#).unwrap();
        assert!(req.fullname.is_none());
        assert!(req.email.is_none());
    }
}
