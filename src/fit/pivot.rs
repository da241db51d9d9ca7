//! Threshold-pivoted linear fit.
//!
//! Fits `y = m·x + b` to the points with `x >= x_threshold`, where the intercept is
//! not a free parameter but is tied to a fixed pivot:
//!
//! ```text
//! b = y_at_threshold - m · x_threshold
//! ```
//!
//! so the fitted line always passes through `(x_threshold, y_at_threshold)`. The
//! pivot encodes the assumption that below the threshold there is no excess
//! outcome, i.e. the outcome sits at its observed floor.
//!
//! The single slope parameter is estimated by bounded nonlinear least squares
//! (`math::lsq`), seeded from a free OLS line.

use nalgebra::DVector;
use tracing::{debug, warn};

use crate::error::FitError;
use crate::math::{Bounds, LsqOptions, fit_line, least_squares, nan_mean, nan_min, sum_squared_error, total_sum_squares};

/// Convergence tolerance used for `ftol`, `xtol` and `gtol`.
const TOLERANCE: f64 = 1e-9;

/// Inputs that shape the fit (everything except the data).
#[derive(Debug, Clone)]
pub struct PivotOptions {
    pub lower: f64,
    pub upper: f64,
    pub x_threshold: f64,
    /// Outcome value enforced at `x_threshold`.
    ///
    /// `None` uses the minimum observed `y` over the *full* input (points below the
    /// threshold included, missing values ignored).
    pub y_at_threshold: Option<f64>,
    pub max_nfev: usize,
}

impl Default for PivotOptions {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 1e6,
            x_threshold: 80.0,
            y_at_threshold: None,
            max_nfev: 20_000,
        }
    }
}

/// Result of a threshold-pivoted fit.
#[derive(Debug, Clone)]
pub struct PivotFit {
    pub slope: f64,
    /// Always `y_at_threshold - slope * x_threshold`.
    pub intercept: f64,
    pub x_threshold: f64,
    pub y_at_threshold: f64,
    pub success: bool,
    pub message: String,
    pub nfev: usize,
    pub rss: f64,
    pub rmse: f64,
    /// NaN when the retained outcomes have zero variance.
    pub r2: f64,
    /// `mask[i]` is true when input pair `i` took part in the fit.
    pub mask: Vec<bool>,
    pub x_selected: Vec<f64>,
    pub y_selected: Vec<f64>,
    pub y_pred_selected: Vec<f64>,
}

impl PivotFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn n(&self) -> usize {
        self.x_selected.len()
    }
}

/// Fit a line through the pivot `(x_threshold, y_at_threshold)` to the points at or
/// above the threshold.
///
/// Missing values are NaN. Errors only for unusable input; convergence problems and
/// malformed bounds come back with `success = false`.
pub fn fit_threshold_pivoted(x: &[f64], y: &[f64], opts: &PivotOptions) -> Result<PivotFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }

    let x_thresh = opts.x_threshold;
    let y_pivot = opts.y_at_threshold.unwrap_or_else(|| nan_min(y));

    let mask: Vec<bool> = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| xi.is_finite() && yi.is_finite() && xi >= x_thresh)
        .collect();

    let (x_sel, y_sel): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|((&xi, &yi), _)| (xi, yi))
        .unzip();

    if x_sel.is_empty() {
        return Err(FitError::NoDataAboveThreshold { threshold: x_thresh });
    }

    let m_init = initial_slope(&x_sel, &y_sel);
    debug!(n = x_sel.len(), m_init, y_pivot, "pivoted fit seeded");

    let residuals = |p: &DVector<f64>| {
        let m = p[0];
        let b = y_pivot - m * x_thresh;
        DVector::from_iterator(x_sel.len(), x_sel.iter().zip(y_sel.iter()).map(|(xi, yi)| m * xi + b - yi))
    };

    let lsq_opts = LsqOptions {
        ftol: TOLERANCE,
        xtol: TOLERANCE,
        gtol: TOLERANCE,
        max_nfev: opts.max_nfev,
    };
    let report = least_squares(
        residuals,
        &DVector::from_element(1, m_init),
        &Bounds::scalar(opts.lower, opts.upper),
        &lsq_opts,
    );
    if !report.success {
        warn!(reason = %report.message, "pivoted fit did not converge");
    }

    let slope = report.x[0];
    let intercept = y_pivot - slope * x_thresh;

    let y_pred: Vec<f64> = x_sel.iter().map(|xi| slope * xi + intercept).collect();
    let rss = sum_squared_error(&y_sel, &y_pred);
    let rmse = (rss / y_sel.len() as f64).sqrt();
    let tss = total_sum_squares(&y_sel);
    let r2 = if tss != 0.0 { 1.0 - rss / tss } else { f64::NAN };

    Ok(PivotFit {
        slope,
        intercept,
        x_threshold: x_thresh,
        y_at_threshold: y_pivot,
        success: report.success,
        message: report.message,
        nfev: report.nfev,
        rss,
        rmse,
        r2,
        mask,
        x_selected: x_sel,
        y_selected: y_sel,
        y_pred_selected: y_pred,
    })
}

/// Seed slope: free OLS line, else `mean(y)/mean(x)`, else 1.0.
fn initial_slope(x: &[f64], y: &[f64]) -> f64 {
    if let Some(line) = fit_line(x, y) {
        if line.slope.is_finite() && line.slope != 0.0 {
            return line.slope;
        }
    }

    let mx = nan_mean(x);
    let my = nan_mean(y);
    let ratio = my / mx;
    if mx != 0.0 && ratio.is_finite() && ratio != 0.0 { ratio } else { 1.0 }
}
