//! Business logic behind the route handlers.
//!
//! - [`auth`] - Signup, verification, signin and password reset
//! - [`email`] - One-time code delivery
//! - [`model`] - The served prediction model

pub mod auth;
pub mod email;
pub mod model;

pub use auth::{AuthError, AuthService};
pub use email::{EmailError, EmailService};
pub use model::{ModelError, ModelHandle};
