//! Authentication error types.
//!
//! Each variant maps to one client-facing message; see
//! [`AuthError::status`] and [`AuthError::client_message`].

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Signup is missing fullname, email or password.
    #[error("missing signup fields")]
    MissingSignupFields,

    /// Signin is missing email or password.
    #[error("missing credentials")]
    MissingCredentials,

    /// Request is missing the email.
    #[error("email is required")]
    EmailRequired,

    /// Request is missing the email or the code.
    #[error("email and otp are required")]
    EmailAndOtpRequired,

    /// Verification request is missing the code.
    #[error("otp is required")]
    OtpRequired,

    /// Reset request is missing the new password.
    #[error("password is required")]
    PasswordRequired,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] solarcast_core::EmailError),

    /// Path segment is not a user ID.
    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] solarcast_core::UserIdError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// A verified account already holds this email.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No account with this ID or email.
    #[error("user not found")]
    UserNotFound,

    /// Signin with an email nobody registered.
    #[error("unknown account")]
    UnknownAccount,

    /// Password reset requested for an email nobody registered.
    #[error("no account to reset")]
    ResetUserNotFound,

    /// Unverified-account cleanup found nothing to delete.
    #[error("no unverified user with this email")]
    NoUnverifiedUser,

    /// Verification attempted on an already verified account.
    #[error("user already verified")]
    AlreadyVerified,

    /// Signin attempted on an unverified account (which has now been removed).
    #[error("email not verified")]
    EmailNotVerified,

    /// Wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signup verification without a pending code.
    #[error("no otp pending")]
    NoOtp,

    /// Signup verification code has expired.
    #[error("signup otp expired")]
    SignupOtpExpired,

    /// Password reset code has expired.
    #[error("reset otp expired")]
    ResetOtpExpired,

    /// Code does not match (or none is pending in the reset flow).
    #[error("invalid otp")]
    InvalidOtp,

    /// First code could not be delivered.
    #[error("failed to send otp email: {0}")]
    OtpEmailFailed(#[source] EmailError),

    /// Replacement code could not be delivered.
    #[error("failed to resend otp: {0}")]
    OtpResendFailed(#[source] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// A generated code was rejected.
    #[error("otp generation failed: {0}")]
    OtpGeneration(#[source] solarcast_core::OtpError),
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingSignupFields
            | Self::MissingCredentials
            | Self::EmailRequired
            | Self::EmailAndOtpRequired
            | Self::OtpRequired
            | Self::PasswordRequired
            | Self::InvalidEmail(_)
            | Self::InvalidUserId(_)
            | Self::WeakPassword(_)
            | Self::UserAlreadyExists
            | Self::AlreadyVerified
            | Self::NoOtp
            | Self::SignupOtpExpired
            | Self::ResetOtpExpired
            | Self::InvalidOtp => StatusCode::BAD_REQUEST,
            Self::UnknownAccount | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::ResetUserNotFound | Self::NoUnverifiedUser => {
                StatusCode::NOT_FOUND
            }
            Self::OtpEmailFailed(_)
            | Self::OtpResendFailed(_)
            | Self::Repository(_)
            | Self::PasswordHash
            | Self::OtpGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Never includes internal details.
    #[must_use]
    pub fn client_message(&self) -> String {
        let message = match self {
            Self::MissingSignupFields => "Please fill all required fields",
            Self::MissingCredentials => "Please enter all required fields",
            Self::EmailRequired => "Email is required",
            Self::EmailAndOtpRequired => "Email and OTP are required",
            Self::OtpRequired => "OTP is required",
            Self::PasswordRequired => "Password is required",
            Self::InvalidEmail(_) => "Invalid email address",
            Self::InvalidUserId(_) => "Invalid user ID",
            Self::WeakPassword(msg) => return msg.clone(),
            Self::UserAlreadyExists => "User already exists",
            Self::UserNotFound => "User not found",
            Self::UnknownAccount => "User does not exist",
            Self::ResetUserNotFound => "User not found. Please sign up first.",
            Self::NoUnverifiedUser => "No unverified user found with this email",
            Self::AlreadyVerified => "User already verified",
            Self::EmailNotVerified => "Email not verified. Please sign up again.",
            Self::InvalidCredentials => "Invalid credentials",
            Self::NoOtp => "No OTP found. Please resend OTP",
            Self::SignupOtpExpired => "OTP expired. Please resend OTP",
            Self::ResetOtpExpired => "OTP expired",
            Self::InvalidOtp => "Invalid OTP",
            Self::OtpEmailFailed(_) => "Failed to send OTP email",
            Self::OtpResendFailed(_) => "Failed to resend OTP",
            Self::Repository(_) | Self::PasswordHash | Self::OtpGeneration(_) => "Server error",
        };
        message.to_string()
    }

    /// Whether this error should be reported to Sentry.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        assert_eq!(AuthError::UnknownAccount.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::ResetUserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::SignupOtpExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::PasswordHash.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_repository_error_message_is_generic() {
        let err = AuthError::Repository(RepositoryError::DataCorruption(
            "invalid email in database".to_string(),
        ));
        assert_eq!(err.client_message(), "Server error");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_weak_password_message_passes_through() {
        let err = AuthError::WeakPassword("password must be at least 8 characters".to_string());
        assert_eq!(err.client_message(), "password must be at least 8 characters");
    }

    #[test]
    fn test_expiry_messages_differ_by_flow() {
        assert_eq!(
            AuthError::SignupOtpExpired.client_message(),
            "OTP expired. Please resend OTP"
        );
        assert_eq!(AuthError::ResetOtpExpired.client_message(), "OTP expired");
    }
}
