//! Seeded train/validation split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

/// Train and validation rows, in permutation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub validate: Vec<T>,
}

/// Shuffle `rows` with `seed` and hold out `ceil(test_size * n)` of them.
///
/// The held-out rows are the head of the permutation.
pub fn train_test_split<T: Clone>(rows: &[T], test_size: f64, seed: u64) -> Result<Split<T>, AppError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::new(2, format!("Test size must be in (0, 1) (got {test_size}).")));
    }
    let n = rows.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AppError::new(
            3,
            format!("Cannot split {n} rows with test size {test_size}: one side would be empty."),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let validate = order[..n_test].iter().map(|&i| rows[i].clone()).collect();
    let train = order[n_test..].iter().map(|&i| rows[i].clone()).collect();
    Ok(Split { train, validate })
}
