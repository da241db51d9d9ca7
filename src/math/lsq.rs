//! Bounded nonlinear least squares.
//!
//! Minimizes `0.5 * Σ r_i(p)^2` subject to `lower <= p <= upper` with a projected
//! Levenberg–Marquardt iteration:
//!
//! - the Jacobian is estimated by forward differences (backward when the forward
//!   step would leave the box)
//! - each trial step solves `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` and is projected back
//!   onto the box
//! - λ shrinks on accepted steps and grows on rejected ones
//!
//! Termination follows the usual least-squares conventions (`gtol`, `ftol`,
//! `xtol`, evaluation budget). Failures are reported in the returned
//! [`LsqReport`], never raised: callers inspect `success` and `message`.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// Forward-difference step scale (≈ sqrt of machine epsilon).
const DIFF_STEP: f64 = 1.490_116_119_384_765_6e-8;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Solver tolerances and evaluation budget.
#[derive(Debug, Clone, Copy)]
pub struct LsqOptions {
    /// Relative cost reduction tolerance.
    pub ftol: f64,
    /// Relative step size tolerance.
    pub xtol: f64,
    /// Projected gradient (∞-norm) tolerance.
    pub gtol: f64,
    /// Maximum number of residual function evaluations (Jacobian columns included).
    pub max_nfev: usize,
}

impl Default for LsqOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            max_nfev: 1000,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsqStatus {
    /// Bounds or initial point are unusable.
    InvalidInput,
    /// Evaluation budget exhausted before convergence.
    MaxEvaluations,
    /// Projected gradient below `gtol`.
    Gtol,
    /// Relative cost reduction below `ftol`.
    Ftol,
    /// Relative step below `xtol`.
    Xtol,
}

impl LsqStatus {
    pub fn is_success(self) -> bool {
        matches!(self, LsqStatus::Gtol | LsqStatus::Ftol | LsqStatus::Xtol)
    }

    pub fn message(self) -> &'static str {
        match self {
            LsqStatus::InvalidInput => "Invalid bounds or initial point.",
            LsqStatus::MaxEvaluations => "The maximum number of function evaluations is exceeded.",
            LsqStatus::Gtol => "`gtol` termination condition is satisfied.",
            LsqStatus::Ftol => "`ftol` termination condition is satisfied.",
            LsqStatus::Xtol => "`xtol` termination condition is satisfied.",
        }
    }
}

/// Solver output.
#[derive(Debug, Clone)]
pub struct LsqReport {
    /// Final parameter vector (always inside the bounds when `status` is not `InvalidInput`).
    pub x: DVector<f64>,
    /// `0.5 * Σ r_i^2` at `x`.
    pub cost: f64,
    /// Residuals at `x`.
    pub fun: DVector<f64>,
    pub nfev: usize,
    pub status: LsqStatus,
    pub success: bool,
    pub message: String,
}

/// Box constraints `lower <= x <= upper` (infinite entries allowed).
#[derive(Debug, Clone)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        Self { lower, upper }
    }

    /// Bounds for a single scalar parameter.
    pub fn scalar(lower: f64, upper: f64) -> Self {
        Self::new(DVector::from_element(1, lower), DVector::from_element(1, upper))
    }

    /// `None` if dimensions disagree or some `lower >= upper` / NaN.
    fn validate(&self, dim: usize) -> Option<()> {
        if self.lower.len() != dim || self.upper.len() != dim {
            return None;
        }
        for (lo, hi) in self.lower.iter().zip(self.upper.iter()) {
            if lo.is_nan() || hi.is_nan() || lo >= hi {
                return None;
            }
        }
        Some(())
    }

    fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            x.len(),
            x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .map(|(&v, (&lo, &hi))| v.clamp(lo, hi)),
        )
    }
}

/// Minimize `0.5 * ‖f(x)‖²` within `bounds`, starting from `x0`.
///
/// `x0` is projected onto the box before the first evaluation.
pub fn least_squares<F>(f: F, x0: &DVector<f64>, bounds: &Bounds, opts: &LsqOptions) -> LsqReport
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let n = x0.len();
    if n == 0 || bounds.validate(n).is_none() || x0.iter().any(|v| !v.is_finite()) {
        return finish(
            DVector::from_element(n, f64::NAN),
            f64::NAN,
            DVector::zeros(0),
            0,
            LsqStatus::InvalidInput,
        );
    }

    let mut x = bounds.project(x0);
    let mut r = f(&x);
    let mut nfev = 1usize;
    let mut cost = half_sq_norm(&r);
    let mut lambda = LAMBDA_INIT;

    // A residual that is undefined at the seed has no usable solution either.
    if !cost.is_finite() {
        return finish(DVector::from_element(n, f64::NAN), cost, r, nfev, LsqStatus::InvalidInput);
    }

    loop {
        if cost == 0.0 {
            return finish(x, cost, r, nfev, LsqStatus::Gtol);
        }
        if nfev + n > opts.max_nfev {
            return finish(x, cost, r, nfev, LsqStatus::MaxEvaluations);
        }

        let jac = jacobian(&f, &x, &r, bounds);
        nfev += n;

        let grad = jac.transpose() * &r;
        if projected_gradient_norm(&grad, &x, bounds) <= opts.gtol {
            return finish(x, cost, r, nfev, LsqStatus::Gtol);
        }

        let jtj = jac.transpose() * &jac;

        // Inner loop: grow λ until a step reduces the cost or becomes negligible.
        loop {
            if nfev >= opts.max_nfev {
                return finish(x, cost, r, nfev, LsqStatus::MaxEvaluations);
            }

            let Some(delta) = damped_step(&jtj, &grad, lambda) else {
                lambda = (lambda * 10.0).min(LAMBDA_MAX);
                if lambda >= LAMBDA_MAX {
                    return finish(x, cost, r, nfev, LsqStatus::Xtol);
                }
                continue;
            };

            let x_new = bounds.project(&(&x + &delta));
            let step = &x_new - &x;
            let step_norm = step.norm();
            let x_norm = x.norm();

            if step_norm <= opts.xtol * (opts.xtol + x_norm) {
                return finish(x, cost, r, nfev, LsqStatus::Xtol);
            }

            let r_new = f(&x_new);
            nfev += 1;
            let cost_new = half_sq_norm(&r_new);

            if cost_new.is_finite() && cost_new < cost {
                let reduction = cost - cost_new;
                let ftol_hit = reduction <= opts.ftol * cost;
                let xtol_hit = step_norm <= opts.xtol * (opts.xtol + x_new.norm());

                x = x_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if ftol_hit {
                    return finish(x, cost, r, nfev, LsqStatus::Ftol);
                }
                if xtol_hit {
                    return finish(x, cost, r, nfev, LsqStatus::Xtol);
                }
                break;
            }

            lambda *= 10.0;
            if lambda >= LAMBDA_MAX {
                return finish(x, cost, r, nfev, LsqStatus::Xtol);
            }
        }
    }
}

fn finish(x: DVector<f64>, cost: f64, fun: DVector<f64>, nfev: usize, status: LsqStatus) -> LsqReport {
    LsqReport {
        x,
        cost,
        fun,
        nfev,
        status,
        success: status.is_success(),
        message: status.message().to_string(),
    }
}

fn half_sq_norm(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

fn jacobian<F>(f: &F, x: &DVector<f64>, r: &DVector<f64>, bounds: &Bounds) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let m = r.len();
    let n = x.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);

    for j in 0..n {
        let mut h = DIFF_STEP * x[j].abs().max(1.0);
        if x[j] + h > bounds.upper[j] {
            h = -h;
        }

        let mut xh = x.clone();
        xh[j] += h;
        // Use the representable step so the quotient is exact in `h`.
        let h_eff = xh[j] - x[j];
        let rh = f(&xh);

        for i in 0..m {
            jac[(i, j)] = (rh[i] - r[i]) / h_eff;
        }
    }

    jac
}

/// ∞-norm of the gradient with components pointing out of the box zeroed.
fn projected_gradient_norm(grad: &DVector<f64>, x: &DVector<f64>, bounds: &Bounds) -> f64 {
    let mut out = 0.0f64;
    for j in 0..grad.len() {
        let g = grad[j];
        let at_lower = x[j] <= bounds.lower[j];
        let at_upper = x[j] >= bounds.upper[j];
        // Descent direction is -g: blocked at lower when g > 0, at upper when g < 0.
        let blocked = (at_lower && g > 0.0) || (at_upper && g < 0.0);
        if !blocked {
            out = out.max(g.abs());
        }
    }
    out
}

fn damped_step(jtj: &DMatrix<f64>, grad: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        let d = jtj[(i, i)].max(1e-12);
        a[(i, i)] += lambda * d;
    }
    let rhs = -grad;

    if let Some(chol) = a.clone().cholesky() {
        let delta = chol.solve(&rhs);
        if delta.iter().all(|v| v.is_finite()) {
            return Some(delta);
        }
    }
    solve_least_squares(&a, &rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_residuals(x: &[f64], y: &[f64]) -> impl Fn(&DVector<f64>) -> DVector<f64> {
        let x = x.to_vec();
        let y = y.to_vec();
        move |p: &DVector<f64>| DVector::from_iterator(x.len(), x.iter().zip(y.iter()).map(|(xi, yi)| p[0] * xi + p[1] - yi))
    }

    #[test]
    fn solves_unconstrained_line() {
        let f = line_residuals(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]);
        let bounds = Bounds::new(
            DVector::from_element(2, f64::NEG_INFINITY),
            DVector::from_element(2, f64::INFINITY),
        );
        let report = least_squares(f, &DVector::from_vec(vec![0.0, 0.0]), &bounds, &LsqOptions::default());
        assert!(report.success, "{}", report.message);
        assert!((report.x[0] - 2.0).abs() < 1e-6);
        assert!((report.x[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn active_bound_stops_at_boundary() {
        // Unconstrained optimum slope is -1; bounded below by 0.
        let x = [1.0, 2.0, 3.0];
        let y = [-1.0, -2.0, -3.0];
        let f = move |p: &DVector<f64>| DVector::from_iterator(3, x.iter().zip(y.iter()).map(|(xi, yi)| p[0] * xi - yi));
        let report = least_squares(f, &DVector::from_element(1, 5.0), &Bounds::scalar(0.0, 10.0), &LsqOptions::default());
        assert!(report.success, "{}", report.message);
        assert!(report.x[0].abs() < 1e-9);
    }

    #[test]
    fn invalid_bounds_are_reported_not_raised() {
        let f = |p: &DVector<f64>| p.clone();
        let report = least_squares(f, &DVector::from_element(1, 1.0), &Bounds::scalar(2.0, 1.0), &LsqOptions::default());
        assert!(!report.success);
        assert_eq!(report.status, LsqStatus::InvalidInput);
        assert!(report.x[0].is_nan());
    }

    #[test]
    fn non_finite_seed_cost_yields_no_solution() {
        let f = |p: &DVector<f64>| DVector::from_vec(vec![p[0] - f64::NAN]);
        let report = least_squares(f, &DVector::from_element(1, 1.0), &Bounds::scalar(0.0, 10.0), &LsqOptions::default());
        assert!(!report.success);
        assert_eq!(report.status, LsqStatus::InvalidInput);
        assert!(report.x[0].is_nan());
    }

    #[test]
    fn tiny_budget_reports_exhaustion() {
        let f = |p: &DVector<f64>| DVector::from_vec(vec![p[0] - 3.0, p[0] - 5.0]);
        let opts = LsqOptions {
            max_nfev: 1,
            ..LsqOptions::default()
        };
        let report = least_squares(f, &DVector::from_element(1, 0.0), &Bounds::scalar(-10.0, 10.0), &opts);
        assert!(!report.success);
        assert_eq!(report.status, LsqStatus::MaxEvaluations);
        assert_eq!(report.nfev, 1);
    }
}
