//! K-fold index splitter.
//!
//! Fold sizes follow the common convention: with `n` rows and `k` folds, the first
//! `n % k` folds hold `n / k + 1` rows and the rest `n / k`. With `shuffle` the
//! row order is permuted once, deterministically from `seed`, before slicing.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

/// `(train_indices, test_indices)` for one fold.
pub type FoldIndices = (Vec<usize>, Vec<usize>);

#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Self {
        Self { n_splits, shuffle, seed }
    }

    pub fn split(&self, n: usize) -> Result<Vec<FoldIndices>, AppError> {
        let k = self.n_splits;
        if k < 2 {
            return Err(AppError::new(2, format!("K-fold needs at least 2 splits (got {k}).")));
        }
        if n < k {
            return Err(AppError::new(
                2,
                format!("Cannot split {n} rows into {k} folds: need at least one row per fold."),
            ));
        }

        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            order.shuffle(&mut rng);
        }

        let base = n / k;
        let extra = n % k;
        let mut out = Vec::with_capacity(k);
        let mut start = 0usize;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let test: Vec<usize> = order[start..end].to_vec();
            let train: Vec<usize> = order[..start].iter().chain(order[end..].iter()).copied().collect();
            out.push((train, test));
            start = end;
        }

        Ok(out)
    }
}
