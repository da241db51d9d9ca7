//! Cross-validated single-feature linear regression.
//!
//! Each candidate indicator is regressed on its own against the temperature
//! residual (`residual = slope · feature + intercept`). Out-of-fold RMSE and R²
//! give a rough sense of how much of the non-temperature variation a single
//! indicator explains; the final line is refit on all rows.

pub mod kfold;

pub use kfold::*;

use tracing::{debug, info, warn};

use crate::domain::Indicator;
use crate::error::AppError;
use crate::math::{Line, fit_line, nan_mean, r2_score, rmse};

/// Out-of-fold scores for one fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldScore {
    pub rmse: f64,
    pub r2: f64,
}

/// Cross-validation summary for one feature.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub feature: Indicator,
    pub n: usize,
    pub folds: Vec<FoldScore>,
    pub mean_rmse: f64,
    pub mean_r2: f64,
    /// Line refit on every row.
    pub line: Line,
    /// Points used for the final fit (for plotting).
    pub points: Vec<(f64, f64)>,
}

/// Run k-fold cross-validation of `y ~ x` for one feature.
///
/// Rows where either value is missing are dropped first.
pub fn cross_validate(feature: Indicator, x: &[f64], y: &[f64], kfold: &KFold) -> Result<CrossValidation, AppError> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();

    let splits = kfold.split(xs.len())?;
    let mut folds = Vec::with_capacity(splits.len());

    for (fold, (train_idx, test_idx)) in splits.iter().enumerate() {
        let x_train: Vec<f64> = train_idx.iter().map(|&i| xs[i]).collect();
        let y_train: Vec<f64> = train_idx.iter().map(|&i| ys[i]).collect();
        let x_test: Vec<f64> = test_idx.iter().map(|&i| xs[i]).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| ys[i]).collect();

        let line = fit_or_flat(&x_train, &y_train);
        let y_pred: Vec<f64> = x_test.iter().map(|&v| line.predict(v)).collect();

        let score = FoldScore {
            rmse: rmse(&y_test, &y_pred),
            r2: r2_score(&y_test, &y_pred),
        };
        debug!(feature = feature.column_name(), fold, rmse = score.rmse, r2 = score.r2, "fold scored");
        folds.push(score);
    }

    let mean_rmse = nan_mean(&folds.iter().map(|f| f.rmse).collect::<Vec<_>>());
    let mean_r2 = nan_mean(&folds.iter().map(|f| f.r2).collect::<Vec<_>>());
    let line = fit_or_flat(&xs, &ys);

    info!(
        feature = feature.column_name(),
        mean_rmse,
        mean_r2,
        slope = line.slope,
        intercept = line.intercept,
        "cross-validated regression"
    );

    Ok(CrossValidation {
        feature,
        n: xs.len(),
        folds,
        mean_rmse,
        mean_r2,
        line,
        points,
    })
}

/// OLS line, or a flat line at the mean when the feature has no spread.
fn fit_or_flat(x: &[f64], y: &[f64]) -> Line {
    fit_line(x, y).unwrap_or_else(|| {
        warn!(n = x.len(), "feature has no spread; using a flat line");
        Line {
            slope: 0.0,
            intercept: nan_mean(y),
        }
    })
}
