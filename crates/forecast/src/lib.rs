//! Solar power forecasting pipeline.
//!
//! Turns the raw per-period weather and power readings into a fitted
//! regression model:
//!
//! 1. [`dataset`]: load the CSV and coerce it to numbers
//! 2. [`impute`]: fill gaps with a KNN imputer
//! 3. [`aggregate`]: roll readings up to one record per day
//! 4. [`split`], [`scaler`], [`forest`]: split, scale and fit
//! 5. [`artifacts`]: persist the fitted model next to its scaler and feature order
//!
//! [`Forecaster`] serves predictions from saved artifacts and [`pipeline`]
//! drives a full training run.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregate;
pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod forecaster;
pub mod forest;
pub mod impute;
pub mod metrics;
pub mod pipeline;
pub mod scaler;
pub mod split;
pub mod tree;

pub use artifacts::Artifacts;
pub use error::{ForecastError, Result};
pub use forecaster::{FeatureRow, Forecaster};
pub use metrics::RegressionScores;
pub use pipeline::{TrainingConfig, TrainingReport, evaluate, fit, train};
