//! KNN-based imputation of missing readings.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Default number of neighbors used for imputation.
pub const DEFAULT_NEIGHBORS: usize = 3;

/// Fills `NaN` cells with the mean of the nearest rows that have the value.
///
/// Distance is the NaN-aware Euclidean distance: squared differences are
/// summed over coordinates present in both rows, then scaled up by
/// `n_features / n_present` so rows with fewer shared coordinates are not
/// artificially close. Neighbors are chosen per missing column among rows
/// that have that column, and averaged with uniform weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnImputer {
    n_neighbors: usize,
    reference: Option<Array2<f64>>,
    column_means: Option<Array1<f64>>,
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBORS)
    }
}

impl KnnImputer {
    /// Create an imputer using `n_neighbors` donors (at least 1).
    #[must_use]
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            reference: None,
            column_means: None,
        }
    }

    /// Number of donors averaged per missing cell.
    #[must_use]
    pub const fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Remember `x` as the donor pool.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::EmptyDataset` if `x` has no rows.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ForecastError::EmptyDataset);
        }

        let means = x
            .axis_iter(Axis(1))
            .map(|col| nan_mean(col).unwrap_or(0.0))
            .collect::<Array1<f64>>();

        self.reference = Some(x.clone());
        self.column_means = Some(means);
        Ok(self)
    }

    /// Return a copy of `x` with every `NaN` imputed.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::NotFitted` before `fit`, or
    /// `ForecastError::Shape` if the width differs from the fitted data.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(reference), Some(means)) = (&self.reference, &self.column_means) else {
            return Err(ForecastError::NotFitted);
        };

        if x.ncols() != reference.ncols() {
            return Err(ForecastError::Shape {
                expected: format!("{} columns", reference.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let incomplete: Vec<usize> = x
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|v| v.is_nan()))
            .map(|(i, _)| i)
            .collect();

        let fills: Vec<(usize, Vec<(usize, f64)>)> = incomplete
            .par_iter()
            .map(|&row_idx| {
                let row = x.row(row_idx);
                (row_idx, self.impute_row(row, reference, means))
            })
            .collect();

        let mut result = x.clone();
        for (row_idx, cells) in fills {
            for (col_idx, value) in cells {
                result[[row_idx, col_idx]] = value;
            }
        }

        Ok(result)
    }

    /// Fit on `x` and impute it in one step.
    ///
    /// # Errors
    ///
    /// See [`KnnImputer::fit`] and [`KnnImputer::transform`].
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn impute_row(
        &self,
        row: ArrayView1<'_, f64>,
        reference: &Array2<f64>,
        means: &Array1<f64>,
    ) -> Vec<(usize, f64)> {
        let distances: Vec<f64> = reference
            .axis_iter(Axis(0))
            .map(|other| nan_euclidean(row, other))
            .collect();

        row.iter()
            .enumerate()
            .filter(|(_, v)| v.is_nan())
            .map(|(col_idx, _)| {
                let mut donors: Vec<(f64, f64)> = distances
                    .iter()
                    .zip(reference.column(col_idx))
                    .filter(|(d, v)| d.is_finite() && !v.is_nan())
                    .map(|(&d, &v)| (d, v))
                    .collect();

                let value = if donors.is_empty() {
                    means[col_idx]
                } else {
                    donors.sort_by(|a, b| a.0.total_cmp(&b.0));
                    let k = self.n_neighbors.min(donors.len());
                    donors.iter().take(k).map(|(_, v)| v).sum::<f64>() / k as f64
                };

                (col_idx, value)
            })
            .collect()
    }
}

/// NaN-aware Euclidean distance; infinite when no coordinate is shared.
fn nan_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let mut present = 0usize;
    let mut accum = 0.0f64;

    for (&ai, &bi) in a.iter().zip(b.iter()) {
        if ai.is_nan() || bi.is_nan() {
            continue;
        }
        present += 1;
        let d = ai - bi;
        accum += d * d;
    }

    if present == 0 {
        return f64::INFINITY;
    }

    let weight = a.len() as f64 / present as f64;
    (weight * accum).sqrt()
}

fn nan_mean(col: ArrayView1<'_, f64>) -> Option<f64> {
    let (sum, count) = col
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_imputes_from_nearest_rows() {
        let data = array![
            [1.0, 10.0],
            [2.0, 20.0],
            [3.0, 30.0],
            [10.0, 100.0],
            [2.1, f64::NAN],
        ];

        let result = KnnImputer::new(3).fit_transform(&data).unwrap();

        // Nearest three by the first column: 2.0, 3.0, 1.0
        assert!((result[[4, 1]] - 20.0).abs() < 1e-9);
        assert!(!result.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_row_itself_is_not_a_donor_for_its_missing_column() {
        let data = array![[0.0, 5.0], [0.0, f64::NAN], [100.0, 50.0]];
        let result = KnnImputer::new(1).fit_transform(&data).unwrap();
        assert!((result[[1, 1]] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_uses_all_donors_when_fewer_than_k() {
        let data = array![[1.0, 4.0], [2.0, 8.0], [1.5, f64::NAN]];
        let result = KnnImputer::new(5).fit_transform(&data).unwrap();
        assert!((result[[2, 1]] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_column_without_donors_falls_back_to_zero_mean() {
        let data = array![[1.0, f64::NAN], [2.0, f64::NAN]];
        let result = KnnImputer::new(3).fit_transform(&data).unwrap();
        assert!(result[[0, 1]].abs() < f64::EPSILON);
    }

    #[test]
    fn test_nan_euclidean_scales_by_present_fraction() {
        let a = array![0.0, f64::NAN, 3.0, 0.0];
        let b = array![0.0, 1.0, 0.0, 4.0];
        // Present: coords 0, 2, 3 -> 0 + 9 + 16 = 25, weight 4/3
        let expected = (25.0f64 * 4.0 / 3.0).sqrt();
        assert!((nan_euclidean(a.view(), b.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let imputer = KnnImputer::default();
        let err = imputer.transform(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, ForecastError::NotFitted));
    }
}
