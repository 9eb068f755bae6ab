//! Core types for SolarCast.
//!
//! This module provides type-safe wrappers for account-related concepts.

pub mod email;
pub mod id;
pub mod otp;

pub use email::{Email, EmailError};
pub use id::{UserId, UserIdError};
pub use otp::{OTP_LENGTH, OTP_VALIDITY_MINUTES, OneTimeCode, OtpError};
