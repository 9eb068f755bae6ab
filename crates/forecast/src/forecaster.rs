//! Prediction over loaded artifacts.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array2;

use crate::artifacts::Artifacts;
use crate::error::{ForecastError, Result};

/// Feature values keyed by column name.
pub type FeatureRow = BTreeMap<String, f64>;

/// A fitted model ready to serve predictions.
///
/// Inputs are ordered by the persisted feature columns, scaled with the
/// persisted scaler, then passed to the forest. Outputs are daily power in kWh.
#[derive(Debug, Clone)]
pub struct Forecaster {
    artifacts: Artifacts,
}

impl Forecaster {
    #[must_use]
    pub const fn new(artifacts: Artifacts) -> Self {
        Self { artifacts }
    }

    /// Load artifacts from a model directory.
    ///
    /// # Errors
    ///
    /// See [`Artifacts::load`].
    pub fn load(dir: &Path) -> Result<Self> {
        Artifacts::load(dir).map(Self::new)
    }

    /// Feature names in the order the model expects them.
    #[must_use]
    pub fn feature_columns(&self) -> &[String] {
        &self.artifacts.feature_columns
    }

    /// Order `row` by the feature columns, using 0 for absent columns.
    #[must_use]
    pub fn reindex(&self, row: &FeatureRow) -> Vec<f64> {
        self.feature_columns()
            .iter()
            .map(|c| row.get(c).copied().unwrap_or(0.0))
            .collect()
    }

    /// Order `row` by the feature columns, failing if any is absent.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::MissingFeatures` listing every absent column
    /// in feature order.
    pub fn require_all(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let missing = self.missing_columns(row);
        if !missing.is_empty() {
            return Err(ForecastError::MissingFeatures(missing));
        }
        Ok(self.reindex(row))
    }

    /// Feature columns absent from `row`, in feature order.
    #[must_use]
    pub fn missing_columns(&self, row: &FeatureRow) -> Vec<String> {
        self.feature_columns()
            .iter()
            .filter(|c| !row.contains_key(*c))
            .cloned()
            .collect()
    }

    /// Predict for one complete row.
    ///
    /// # Errors
    ///
    /// Returns an error if a feature is missing or non-finite.
    pub fn predict_one(&self, row: &FeatureRow) -> Result<f64> {
        let values = self.require_all(row)?;
        let predictions = self.predict_ordered(&[values])?;
        predictions
            .first()
            .copied()
            .ok_or(ForecastError::EmptyDataset)
    }

    /// Predict for several complete rows.
    ///
    /// # Errors
    ///
    /// Returns an error if any row is missing a feature or holds a
    /// non-finite value.
    pub fn predict_many(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        let ordered = rows
            .iter()
            .map(|row| self.require_all(row))
            .collect::<Result<Vec<_>>>()?;
        self.predict_ordered(&ordered)
    }

    /// Predict for rows already in feature order.
    ///
    /// # Errors
    ///
    /// Returns an error if a row has the wrong width or a non-finite value.
    pub fn predict_ordered(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let width = self.feature_columns().len();
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(ForecastError::Shape {
                    expected: format!("{width} features"),
                    actual: format!("{} features", row.len()),
                });
            }
            if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
                let name = self.feature_columns().get(pos).cloned().unwrap_or_default();
                return Err(ForecastError::NonFinite(name));
            }
            flat.extend_from_slice(row);
        }

        let x = Array2::from_shape_vec((rows.len(), width), flat).map_err(|e| {
            ForecastError::Shape {
                expected: format!("{} x {width}", rows.len()),
                actual: e.to_string(),
            }
        })?;

        let scaled = self.artifacts.scaler.transform(&x)?;
        Ok(self.artifacts.model.predict(&scaled)?.to_vec())
    }
}
