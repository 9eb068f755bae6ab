//! Seeded train/test split.

use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::error::{ForecastError, Result};

/// The four parts of a split.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle rows with a seeded RNG and hold out `ceil(n * test_size)` of them.
///
/// At least one row lands on each side.
///
/// # Errors
///
/// Returns `ForecastError::Validation` if there are fewer than two rows,
/// `test_size` is outside `(0, 1)`, or `x` and `y` disagree on length.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<Split> {
    let n = x.nrows();

    if n != y.len() {
        return Err(ForecastError::Shape {
            expected: format!("y length = {n}"),
            actual: format!("y length = {}", y.len()),
        });
    }

    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ForecastError::Validation(format!(
            "test size must be between 0 and 1, got {test_size}"
        )));
    }

    if n < 2 {
        return Err(ForecastError::Validation(format!(
            "need at least 2 rows to split, got {n}"
        )));
    }

    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(Split {
        x_train: x.select(Axis(0), train_idx),
        x_test: x.select(Axis(0), test_idx),
        y_train: y.select(Axis(0), train_idx),
        y_test: y.select(Axis(0), test_idx),
    })
}
