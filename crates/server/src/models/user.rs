//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use solarcast_core::{Email, OneTimeCode, UserId};

/// An account (domain type).
#[derive(Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name given at signup.
    pub fullname: String,
    /// User's email address.
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Optional phone number given at signup.
    pub phonenumber: Option<String>,
    /// Whether the email has been verified.
    pub is_verified: bool,
    /// The pending one-time code, if any.
    pub otp: Option<OneTimeCode>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("is_verified", &self.is_verified)
            .field("password_hash", &"[REDACTED]")
            .field("otp", &self.otp.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Public view of a user returned after signup and verification.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub fullname: String,
    pub email: Email,
}

/// Public view of a user returned after signin.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub fullname: String,
    pub email: Email,
    pub phonenumber: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            phonenumber: user.phonenumber.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::generate(),
            fullname: "Ada Lovelace".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            phonenumber: None,
            is_verified: false,
            otp: Some(OneTimeCode::issue("123456", now).unwrap()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let output = format!("{:?}", user());
        assert!(output.contains("ada@example.com"));
        assert!(!output.contains("argon2id"));
        assert!(!output.contains("123456"));
    }

    #[test]
    fn test_profile_defaults_phone_to_empty() {
        let json = serde_json::to_value(UserProfile::from(&user())).unwrap();
        assert_eq!(json["phonenumber"], "");
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_summary_omits_phone() {
        let json = serde_json::to_value(UserSummary::from(&user())).unwrap();
        assert!(json.get("phonenumber").is_none());
        assert_eq!(json["fullname"], "Ada Lovelace");
    }
}
