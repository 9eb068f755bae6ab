//! Standard (z-score) feature scaling.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Centers each column on its mean and divides by its population standard
/// deviation. Columns with zero spread are only centered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn per-column mean and standard deviation (ddof = 0).
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::EmptyDataset` if `x` has no rows.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let mean = x.mean_axis(Axis(0)).ok_or(ForecastError::EmptyDataset)?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Scale `x` with the fitted statistics.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::NotFitted` before `fit`, or
    /// `ForecastError::Shape` if `x` has a different number of columns.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(ForecastError::NotFitted);
        };

        if x.ncols() != mean.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok((x - mean) / scale)
    }

    /// Fit on `x`, then scale it.
    ///
    /// # Errors
    ///
    /// See [`StandardScaler::fit`] and [`StandardScaler::transform`].
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Number of columns seen during `fit`, if fitted.
    #[must_use]
    pub fn n_features(&self) -> Option<usize> {
        self.mean.as_ref().map(Array1::len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_population_std() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaled = StandardScaler::new().fit_transform(&x).unwrap();

        // mean 2, std 1 (ddof = 0)
        assert!((scaled[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((scaled[[1, 0]] - 1.0).abs() < 1e-12);
        // Constant column is centered only
        assert!(scaled[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn test_transform_rejects_width_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();

        let err = scaler.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, ForecastError::Shape { .. }));
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let err = StandardScaler::new().transform(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, ForecastError::NotFitted));
    }

    #[test]
    fn test_serde_keeps_statistics() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[0.0], [10.0]]).unwrap();

        let json = serde_json::to_string(&scaler).unwrap();
        let restored: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, scaler);
        assert_eq!(restored.n_features(), Some(1));
    }
}
