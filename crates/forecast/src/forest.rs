//! Bagged ensemble of regression trees.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::tree::DecisionTree;

/// Default number of trees.
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Default base seed.
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Random forest regressor.
///
/// Each tree is grown on a bootstrap sample drawn with its own ChaCha stream
/// seeded from `random_state + tree index`, so a fit is reproducible no
/// matter how rayon schedules the trees. Every split considers all features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(DEFAULT_ESTIMATORS)
    }
}

impl RandomForest {
    #[must_use]
    pub const fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: DEFAULT_RANDOM_STATE,
            n_features: 0,
            feature_importances: None,
        }
    }

    #[must_use]
    pub const fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    #[must_use]
    pub const fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Fit all trees in parallel.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::Validation` for zero estimators,
    /// `ForecastError::EmptyDataset` for no samples, or a shape error.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(ForecastError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ForecastError::EmptyDataset);
        }
        if self.n_estimators == 0 {
            return Err(ForecastError::Validation(
                "forest needs at least one tree".to_owned(),
            ));
        }

        self.n_features = x.ncols();

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample);
                let y_boot = y.select(Axis(0), &sample);

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.feature_importances = Some(self.average_importances());

        tracing::debug!(
            trees = self.trees.len(),
            samples = n_samples,
            features = self.n_features,
            "Random forest fitted"
        );

        Ok(self)
    }

    fn average_importances(&self) -> Array1<f64> {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(DecisionTree::feature_importances) {
            total += imp;
        }

        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        total
    }

    /// Mean prediction over all trees.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::NotFitted` before `fit`, or a shape error.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ForecastError::NotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for pred in &per_tree {
            sum += pred;
        }
        Ok(sum / per_tree.len() as f64)
    }

    /// Normalized mean impurity decrease per feature.
    #[must_use]
    pub const fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of fitted trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of features seen during `fit`.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(r, c)| if c == 0 { r as f64 } else { 1.0 });
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_regressor_tracks_trend() {
        let (x, y) = linear_data();
        let mut rf = RandomForest::new(20);
        rf.fit(&x, &y).unwrap();

        let pred = rf.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|d| d * d).mean().unwrap();
        assert!(mse < 25.0, "MSE too high: {mse}");
        assert_eq!(rf.n_trees(), 20);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = linear_data();

        let mut a = RandomForest::new(10).with_random_state(7);
        let mut b = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let probe = array![[3.5, 1.0], [27.2, 1.0]];
        assert_eq!(a.predict(&probe).unwrap(), b.predict(&probe).unwrap());
    }

    #[test]
    fn test_constant_feature_has_no_importance() {
        let (x, y) = linear_data();
        let mut rf = RandomForest::new(10);
        rf.fit(&x, &y).unwrap();

        let imp = rf.feature_importances().unwrap();
        assert!(imp[1].abs() < 1e-12);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_without_bootstrap_matches_single_tree() {
        let (x, y) = linear_data();
        let mut rf = RandomForest::new(3).with_bootstrap(false);
        rf.fit(&x, &y).unwrap();

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let probe = array![[12.0, 1.0]];
        let diff = rf.predict(&probe).unwrap()[0] - tree.predict(&probe).unwrap()[0];
        assert!(diff.abs() < 1e-9);
    }

    #[test]
    fn test_predict_before_fit() {
        let rf = RandomForest::default();
        assert!(matches!(
            rf.predict(&array![[1.0, 2.0]]),
            Err(ForecastError::NotFitted)
        ));
    }
}
