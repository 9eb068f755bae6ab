//! User repository for database operations.
//!
//! Queries are checked at runtime; rows come back as [`UserRow`] and are
//! validated into the [`User`] domain type before leaving this module.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use solarcast_core::{Email, OneTimeCode, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::User;

const USER_COLUMNS: &str = "id, fullname, email, password_hash, phonenumber, is_verified, \
                            otp, otp_expires_at, created_at, updated_at";

/// Fields needed to insert a new account.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub fullname: &'a str,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub phonenumber: Option<&'a str>,
    pub otp: &'a OneTimeCode,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    fullname: String,
    email: String,
    password_hash: String,
    phonenumber: Option<String>,
    is_verified: bool,
    otp: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let otp = match (row.otp, row.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(OneTimeCode::from_parts(code, expires_at)),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "user {} has an otp without an expiry",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: UserId::from_uuid(row.id),
            fullname: row.fullname,
            email,
            password_hash: row.password_hash,
            phonenumber: row.phonenumber,
            is_verified: row.is_verified,
            otp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Replace an unverified account with a fresh signup, atomically.
    ///
    /// Any unverified row with the same email is removed first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a verified account holds the email.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn replace_unverified(&self, new_user: &NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM users WHERE email = $1 AND NOT is_verified")
            .bind(new_user.email.as_str())
            .execute(&mut *tx)
            .await?;

        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (id, fullname, email, password_hash, phonenumber, otp, otp_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::generate().as_uuid())
        .bind(new_user.fullname)
        .bind(new_user.email.as_str())
        .bind(new_user.password_hash)
        .bind(new_user.phonenumber)
        .bind(new_user.otp.code())
        .bind(new_user.otp.expires_at())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        tx.commit().await?;

        User::try_from(row)
    }

    /// Store a new pending code, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_otp(&self, id: UserId, otp: &OneTimeCode) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET otp = $2, otp_expires_at = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(otp.code())
        .bind(otp.expires_at())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark a user as verified and clear the pending code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_verified(&self, id: UserId) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET is_verified = TRUE, otp = NULL, otp_expires_at = NULL, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound).and_then(User::try_from)
    }

    /// Set a new password hash and clear the pending code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET password_hash = $2, otp = NULL, otp_expires_at = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the unverified account holding `email`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_unverified_by_email(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1 AND NOT is_verified")
            .bind(email.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
