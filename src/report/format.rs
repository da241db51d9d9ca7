//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use std::path::Path;

use crate::domain::{Indicator, TempSource};
use crate::fit::{Residualized, TempFit};
use crate::io::ingest::RowError;
use crate::regress::CrossValidation;
use crate::report::ResidualRankings;

/// Format the temperature fit diagnostics. The series used for residuals is starred.
pub fn format_fit_summary(fits: &[TempFit], rows_with_outcome: usize, residual_source: TempSource) -> String {
    let mut out = String::new();

    out.push_str("=== heatrisk - heat exposure vs ED visits ===\n");
    if let Some(first) = fits.first() {
        out.push_str(&format!(
            "Threshold: {:.1} F | pivot: {:.2} visits / 100000\n",
            first.fit.x_threshold, first.fit.y_at_threshold
        ));
    }
    out.push_str(&format!("Counties with ED visits: {rows_with_outcome}\n"));

    out.push_str("\nTemperature fits (points at or above threshold):\n");
    out.push_str(&format!(
        "  {:<10} {:>4} {:>10} {:>12} {:>10} {:>8}  {}\n",
        "source", "n", "slope", "intercept", "RMSE", "R2", "status"
    ));
    for t in fits {
        let chosen = if t.source == residual_source { "*" } else { " " };
        let status = if t.fit.success { "ok" } else { "FAILED" };
        out.push_str(&format!(
            "{chosen} {:<10} {:>4} {:>10} {:>12} {:>10} {:>8}  {status} ({})\n",
            t.source.display_name(),
            t.fit.n(),
            fmt_num(t.fit.slope, 4),
            fmt_num(t.fit.intercept, 3),
            fmt_num(t.fit.rmse, 3),
            fmt_num(t.fit.r2, 3),
            t.fit.message,
        ));
    }
    out.push('\n');

    out
}

/// Format the first `limit` row-level ingest problems.
pub fn format_row_errors(errors: &[RowError], limit: usize) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = format!("Row problems ({}):\n", errors.len());
    for e in errors.iter().take(limit) {
        match &e.county {
            Some(county) => out.push_str(&format!("  line {}: {county}: {}\n", e.line, e.message)),
            None => out.push_str(&format!("  line {}: {}\n", e.line, e.message)),
        }
    }
    if errors.len() > limit {
        out.push_str(&format!("  ... and {} more\n", errors.len() - limit));
    }
    out
}

/// Format what residualization kept and dropped.
pub fn format_residual_summary(res: &Residualized, source: TempSource) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Residuals vs {} fit: kept {} counties (incomplete={}, below threshold={}, excluded={}, unparsable={})\n",
        source.display_name(),
        res.rows.len(),
        res.incomplete,
        res.below_threshold,
        res.excluded,
        res.skipped.len(),
    ));
    for (county, reason) in &res.skipped {
        out.push_str(&format!("  skipped {county}: {reason}\n"));
    }
    out
}

/// Format Pearson correlations with the residual, strongest first.
pub fn format_correlations(correlations: &[(Indicator, f64)]) -> String {
    let mut sorted = correlations.to_vec();
    sorted.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    let mut out = String::from("\nCorrelation with temperature residual:\n");
    for (ind, r) in sorted {
        out.push_str(&format!("  {:<34} {:>8}\n", truncate(ind.column_name(), 34), fmt_num(r, 3)));
    }
    out
}

/// Format the highest/lowest residual tables.
pub fn format_rankings(rankings: &ResidualRankings) -> String {
    let mut out = String::new();

    out.push_str("\nHighest residual (more visits than temperature explains):\n");
    out.push_str(&format_table(&rankings.highest));

    out.push_str("\nLowest residual:\n");
    out.push_str(&format_table(&rankings.lowest));

    out
}

fn format_table(rows: &[crate::domain::ResidualRecord]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<18} {:>8} {:>10} {:>10} {:>10}\n",
            "county", "temp", "observed", "predicted", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<18} {:-<8} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:<18} {:>8.1} {:>10.2} {:>10.2} {:>10.2}\n",
            truncate(&r.county, 18),
            r.temp,
            r.observed,
            r.predicted,
            r.residual
        ));
    }
    out
}

/// Format the train/validation split outcome.
pub fn format_split_summary(n_train: usize, n_validate: usize, train_path: &Path, validate_path: &Path) -> String {
    format!(
        "\nSplit: train={n_train} -> {} | validate={n_validate} -> {}\n",
        train_path.display(),
        validate_path.display()
    )
}

/// Format cross-validated regression results, one block per feature.
pub fn format_regression(results: &[CrossValidation]) -> String {
    let mut out = String::from("=== Single-feature regression on temperature residual ===\n");
    for cv in results {
        out.push_str(&format!("\n{} (n={}, folds={})\n", cv.feature.column_name(), cv.n, cv.folds.len()));
        for (i, fold) in cv.folds.iter().enumerate() {
            out.push_str(&format!(
                "  fold {}: RMSE={} R2={}\n",
                i + 1,
                fmt_num(fold.rmse, 3),
                fmt_num(fold.r2, 3)
            ));
        }
        out.push_str(&format!(
            "  mean  : RMSE={} R2={}\n",
            fmt_num(cv.mean_rmse, 3),
            fmt_num(cv.mean_r2, 3)
        ));
        out.push_str(&format!("  {}\n", format_equation(cv.line.slope, cv.line.intercept)));
    }
    out
}

/// `y = a·x + c` with the sign folded into the operator.
pub fn format_equation(slope: f64, intercept: f64) -> String {
    let op = if intercept < 0.0 { '-' } else { '+' };
    format!("y = {slope:.4}·x {op} {:.4}", intercept.abs())
}

/// Format the outcome of `heatrisk build`.
pub fn format_build_summary(counties: usize, complete: usize, written: &[&Path]) -> String {
    let mut out = format!("Merged {counties} counties ({complete} complete rows)\n");
    for path in written {
        out.push_str(&format!("  wrote {}\n", path.display()));
    }
    out
}

fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Line;
    use crate::regress::FoldScore;

    #[test]
    fn equation_folds_sign() {
        assert_eq!(format_equation(1.5, -2.25), "y = 1.5000·x - 2.2500");
        assert_eq!(format_equation(-0.5, 3.0), "y = -0.5000·x + 3.0000");
    }

    #[test]
    fn nan_prints_as_na() {
        assert_eq!(fmt_num(f64::NAN, 3), "n/a");
        assert_eq!(fmt_num(1.23456, 2), "1.23");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("San Bernardino", 8), "San Ber.");
        assert_eq!(truncate("Kern", 8), "Kern");
    }

    #[test]
    fn regression_block_lists_folds_and_equation() {
        let cv = CrossValidation {
            feature: Indicator::EnergyBurden,
            n: 10,
            folds: vec![FoldScore { rmse: 1.0, r2: 0.5 }, FoldScore { rmse: 3.0, r2: f64::NAN }],
            mean_rmse: 2.0,
            mean_r2: 0.5,
            line: Line {
                slope: 2.0,
                intercept: 1.0,
            },
            points: Vec::new(),
        };
        let txt = format_regression(&[cv]);
        assert!(txt.contains("Energy Burden % of Income (n=10, folds=2)"));
        assert!(txt.contains("  fold 2: RMSE=3.000 R2=n/a\n"));
        assert!(txt.contains("  mean  : RMSE=2.000 R2=0.500\n"));
        assert!(txt.contains("y = 2.0000·x + 1.0000"));
    }

    #[test]
    fn row_errors_are_capped() {
        let errors: Vec<RowError> = (0..4)
            .map(|i| RowError {
                line: i + 2,
                county: None,
                message: "bad".to_string(),
            })
            .collect();
        let txt = format_row_errors(&errors, 2);
        assert!(txt.starts_with("Row problems (4):\n"));
        assert!(txt.ends_with("  ... and 2 more\n"));
        assert!(format_row_errors(&[], 2).is_empty());
    }
}
