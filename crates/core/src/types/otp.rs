//! One-time codes for email verification and password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of decimal digits in a code.
pub const OTP_LENGTH: usize = 6;

/// How long a code stays valid after it is issued.
pub const OTP_VALIDITY_MINUTES: i64 = 5;

/// Reasons a code can be rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    /// The code is not exactly six ASCII digits.
    #[error("code must be {OTP_LENGTH} digits")]
    Malformed,
    /// The code's validity window has passed.
    #[error("code expired")]
    Expired,
    /// The submitted code does not match the issued one.
    #[error("code does not match")]
    Mismatch,
}

/// An issued one-time code together with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    code: String,
    expires_at: DateTime<Utc>,
}

impl OneTimeCode {
    /// Issue a code at `issued_at`; it expires [`OTP_VALIDITY_MINUTES`] later.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::Malformed`] if `code` is not six ASCII digits.
    pub fn issue(code: impl Into<String>, issued_at: DateTime<Utc>) -> Result<Self, OtpError> {
        let code = code.into();
        if !is_well_formed(&code) {
            return Err(OtpError::Malformed);
        }

        Ok(Self {
            code,
            expires_at: issued_at + Duration::minutes(OTP_VALIDITY_MINUTES),
        })
    }

    /// Rebuild a stored code. Stored values are trusted as-is.
    #[must_use]
    pub const fn from_parts(code: String, expires_at: DateTime<Utc>) -> Self {
        Self { code, expires_at }
    }

    /// The digits of the code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// When the code stops being accepted.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the code is expired at `now`.
    ///
    /// The expiry instant itself is still valid.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check a submitted code at `now`.
    ///
    /// Expiry is checked before the digits, so a stale code never reveals
    /// whether the guess was right.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::Expired`] or [`OtpError::Mismatch`].
    pub fn verify(&self, candidate: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.is_expired(now) {
            return Err(OtpError::Expired);
        }

        if !self.matches(candidate) {
            return Err(OtpError::Mismatch);
        }

        Ok(())
    }

    /// Whether `candidate` is this code, ignoring surrounding whitespace.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.trim() == self.code
    }
}

fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_sets_five_minute_expiry() {
        let otp = OneTimeCode::issue("482913", issued_at()).unwrap();
        assert_eq!(otp.expires_at() - issued_at(), Duration::minutes(5));
    }

    #[test]
    fn test_issue_rejects_malformed_codes() {
        assert_eq!(
            OneTimeCode::issue("12345", issued_at()),
            Err(OtpError::Malformed)
        );
        assert_eq!(
            OneTimeCode::issue("12a456", issued_at()),
            Err(OtpError::Malformed)
        );
    }

    #[test]
    fn test_verify_within_window() {
        let otp = OneTimeCode::issue("482913", issued_at()).unwrap();
        let now = issued_at() + Duration::minutes(4);
        assert_eq!(otp.verify("482913", now), Ok(()));
        assert_eq!(otp.verify(" 482913 ", now), Ok(()));
        assert_eq!(otp.verify("482914", now), Err(OtpError::Mismatch));
    }

    #[test]
    fn test_expires_after_five_minutes() {
        let otp = OneTimeCode::issue("482913", issued_at()).unwrap();

        let at_boundary = issued_at() + Duration::minutes(5);
        assert!(!otp.is_expired(at_boundary));
        assert_eq!(otp.verify("482913", at_boundary), Ok(()));

        let just_after = at_boundary + Duration::seconds(1);
        assert!(otp.is_expired(just_after));
        assert_eq!(otp.verify("482913", just_after), Err(OtpError::Expired));
    }

    #[test]
    fn test_expired_takes_precedence_over_mismatch() {
        let otp = OneTimeCode::issue("482913", issued_at()).unwrap();
        let later = issued_at() + Duration::minutes(30);
        assert_eq!(otp.verify("000000", later), Err(OtpError::Expired));
    }

    #[test]
    fn test_matches_ignores_expiry_and_whitespace() {
        let otp = OneTimeCode::issue("482913", issued_at()).unwrap();
        assert!(otp.matches(" 482913 "));
        assert!(!otp.matches("654321"));
        assert!(otp.is_expired(issued_at() + Duration::minutes(10)));
    }
}
