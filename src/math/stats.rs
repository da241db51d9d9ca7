//! Small NaN-aware descriptive statistics.
//!
//! Missing values are encoded as NaN throughout the crate. Unless stated
//! otherwise, helpers here skip non-finite entries the way the usual
//! `nan*` reductions do.

/// Minimum over finite values, or NaN if there are none.
pub fn nan_min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(f64::NAN)
}

/// Mean over finite values, or NaN if there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sum of squared differences between `observed` and `predicted`.
pub fn sum_squared_error(observed: &[f64], predicted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p) * (o - p))
        .sum()
}

/// Total sum of squares around the mean.
pub fn total_sum_squares(observed: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    observed.iter().map(|v| (v - mean) * (v - mean)).sum()
}

/// Root-mean-square error. NaN for empty input.
pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return f64::NAN;
    }
    (sum_squared_error(observed, predicted) / observed.len() as f64).sqrt()
}

/// Coefficient of determination as used for scoring held-out folds.
///
/// A constant target has no variance to explain: a perfect prediction scores
/// 1.0 and anything else 0.0, so fold averages stay finite.
pub fn r2_score(observed: &[f64], predicted: &[f64]) -> f64 {
    let rss = sum_squared_error(observed, predicted);
    let tss = total_sum_squares(observed);
    if tss == 0.0 {
        return if rss == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - rss / tss
}

/// Pearson correlation over pairs where both values are finite.
///
/// NaN when fewer than two complete pairs remain or either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for &(a, b) in &pairs {
        cov += (a - mx) * (b - my);
        vx += (a - mx) * (a - mx);
        vy += (b - my) * (b - my);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return f64::NAN;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_reductions_skip_missing() {
        let v = [f64::NAN, 3.0, 1.0, f64::NAN, 2.0];
        assert_eq!(nan_min(&v), 1.0);
        assert!((nan_mean(&v) - 2.0).abs() < 1e-12);
        assert!(nan_min(&[f64::NAN]).is_nan());
        assert!(nan_mean(&[]).is_nan());
    }

    #[test]
    fn r2_score_constant_target() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 3.0]), 0.0);
    }

    #[test]
    fn r2_and_rmse_on_known_values() {
        let obs = [1.0, 2.0, 3.0];
        let pred = [1.0, 2.0, 4.0];
        assert!((rmse(&obs, &pred) - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((r2_score(&obs, &pred) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pearson_perfect_and_pairwise() {
        let x = [1.0, 2.0, f64::NAN, 4.0];
        let y = [2.0, 4.0, 100.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);

        let neg = [8.0, 4.0, 0.0, -4.0];
        assert!((pearson(&x, &neg) + 1.0).abs() < 1e-12);

        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }
}
