//! SolarCast Core - Shared types library.
//!
//! This crate provides common types used across all SolarCast components:
//! - `forecast` - Dataset preparation, model training and inference
//! - `server` - HTTP API for predictions and account management
//! - `cli` - Command-line tools for migrations and training
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user IDs, emails and one-time codes
//! - [`features`] - Dataset column names and the model feature set

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod features;
pub mod types;

pub use features::*;
pub use types::*;
