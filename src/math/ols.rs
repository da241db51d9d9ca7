//! Ordinary least squares.
//!
//! Two users in this crate:
//! - the pivoted fitter seeds its slope with a free line fit
//! - the cross-validated regressor fits `y = slope * x + intercept` per fold
//!
//! Both reduce to a tiny tall system `X β = y`, which we solve through SVD so that
//! rank-deficient inputs (a single point, all-equal x) come back as `None`
//! instead of panicking.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Reject rank-deficient systems outright; the min-norm solution SVD would
    // otherwise return is not a meaningful line.
    let sv_max = svd.singular_values.max();
    if !(sv_max.is_finite() && sv_max > 0.0) {
        return None;
    }
    if svd.singular_values.iter().any(|&s| s <= sv_max * 1e-12) {
        return None;
    }

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A straight line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a free line through `(x, y)` by ordinary least squares.
///
/// Returns `None` for fewer than two points, mismatched lengths, or when all x
/// values coincide.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<Line> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    let rhs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &rhs)?;
    Some(Line {
        slope: beta[1],
        intercept: beta[0],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_recovers_exact_line() {
        let x = [80.0, 85.0, 90.0];
        let y = [10.0, 19.0, 28.0];
        let line = fit_line(&x, &y).unwrap();
        assert!((line.slope - 1.8).abs() < 1e-9);
        assert!((line.intercept + 134.0).abs() < 1e-7);
        assert!((line.predict(100.0) - 46.0).abs() < 1e-7);
    }

    #[test]
    fn fit_line_rejects_degenerate_inputs() {
        assert!(fit_line(&[1.0], &[2.0]).is_none());
        assert!(fit_line(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(fit_line(&[1.0, 2.0], &[1.0]).is_none());
    }
}
